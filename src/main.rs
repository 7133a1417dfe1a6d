//! 管理核心运维入口
//! 执行数据库迁移与健康检查；业务接口由宿主服务通过库调用

use admin_core::{config::AppConfig, db, repository::PgStore, telemetry, AdminCore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let command = args.get(1).map(String::as_str);
    match command {
        Some("--version") => {
            println!("admin-core {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some("migrate") | Some("check") | None => {}
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    }

    // 加载 .env 文件（开发环境）
    if let Ok(env) = std::env::var("ADMIN_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    // 3. 数据库连接池
    let pool = db::create_pool(&config.database).await?;

    if command != Some("check") {
        db::run_migrations(&pool).await?;
    }

    // 4. 装配并自检
    let core = AdminCore::from_config(&config, PgStore::new(pool.clone()))?;
    tracing::info!(
        templates = core.catalog().len(),
        "Admin core assembled"
    );

    let health = db::health_check(&pool).await;
    if !health.is_healthy() {
        anyhow::bail!("Database unhealthy: {:?}", health);
    }

    tracing::info!(?health, "Admin core ready");
    pool.close().await;
    Ok(())
}

fn print_help() {
    println!("admin-core {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: admin-core [命令]");
    println!();
    println!("命令:");
    println!("  migrate       运行数据库迁移并检查连接（默认）");
    println!("  check         只检查配置与数据库连接");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 ADMIN_ 前缀的环境变量完成，例如 ADMIN_DATABASE__URL");
}
