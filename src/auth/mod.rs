//! 凭据处理
//! 密码哈希与密码策略

pub mod password;

pub use password::PasswordHasher;
