//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty, compact
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 密码最小长度
    pub password_min_length: usize,
    /// 密码必须包含大写字母
    pub password_require_uppercase: bool,
    /// 密码必须包含数字
    pub password_require_digit: bool,
    /// 密码必须包含特殊字符
    pub password_require_special: bool,
    /// Argon2 内存开销（KiB）
    pub argon2_memory_kib: u32,
    /// Argon2 迭代次数
    pub argon2_iterations: u32,
    /// Argon2 并行度
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// 单个请求的默认截止时间（秒），0 表示不限制
    pub request_timeout_secs: u64,
    /// 平台租户：唯一可以维护全局菜单目录的租户
    pub platform_tenant: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub core: CoreConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.password_min_length", 8)?
            .set_default("security.password_require_uppercase", true)?
            .set_default("security.password_require_digit", true)?
            .set_default("security.password_require_special", false)?
            .set_default("security.argon2_memory_kib", 65536)?
            .set_default("security.argon2_iterations", 3)?
            .set_default("security.argon2_parallelism", 4)?
            .set_default("core.request_timeout_secs", 30)?
            .set_default("core.platform_tenant", crate::context::PLATFORM_TENANT)?;

        // 从环境变量加载配置（前缀为 ADMIN_）
        settings = settings.add_source(
            Environment::with_prefix("ADMIN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, compact",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证密码策略
        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        if self.security.argon2_iterations == 0 || self.security.argon2_parallelism == 0 {
            return Err(ConfigError::Message(
                "argon2_iterations and argon2_parallelism must be positive".to_string(),
            ));
        }

        // argon2 要求 m >= 8 * p
        if self.security.argon2_memory_kib < 8 * self.security.argon2_parallelism {
            return Err(ConfigError::Message(
                "argon2_memory_kib must be at least 8 * argon2_parallelism".to_string(),
            ));
        }

        if self.core.request_timeout_secs > 3600 {
            return Err(ConfigError::Message(
                "request_timeout_secs must not exceed 3600".to_string(),
            ));
        }

        if self.core.platform_tenant.trim().is_empty() {
            return Err(ConfigError::Message(
                "platform_tenant must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// 默认请求截止时间
    pub fn request_timeout(&self) -> Option<std::time::Duration> {
        match self.core.request_timeout_secs {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }
}
