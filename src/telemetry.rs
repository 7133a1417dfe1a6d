//! 日志与追踪系统
//! 初始化结构化日志

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化日志与追踪系统
///
/// `RUST_LOG` 优先于配置中的日志级别。重复调用时保留第一次安装的 subscriber。
pub fn init_telemetry(config: &AppConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // 根据配置选择日志格式
    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(false)
            .boxed(),
        "pretty" => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            level = %config.logging.level,
            format = %config.logging.format,
            "Telemetry initialized"
        );
    }
}
