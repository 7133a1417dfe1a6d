//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::{seq::SliceRandom, Rng};

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SPECIAL: &[u8] = b"!@#$%^&*-_=+";

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    policy: SecurityConfig,
}

impl PasswordHasher {
    /// Create hasher from the security section of the configuration
    pub fn new(config: &SecurityConfig) -> Result<Self, AppError> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Ok(Self {
            argon2,
            policy: config.clone(),
        })
    }

    /// Hash a password
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            AppError::Internal(format!("Failed to parse password hash: {}", e))
        })?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Validate password against policy
    pub fn validate_policy(&self, password: &str) -> Result<(), AppError> {
        let policy = &self.policy;

        // Check length
        if password.chars().count() < policy.password_min_length {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                policy.password_min_length
            )));
        }

        // Check uppercase
        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::validation(
                "Password must contain at least one uppercase letter",
            ));
        }

        // Check digit
        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::validation(
                "Password must contain at least one digit",
            ));
        }

        // Check special character
        if policy.password_require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err(AppError::validation(
                "Password must contain at least one special character",
            ));
        }

        Ok(())
    }

    /// 生成满足当前策略的随机密码（用于重置密码）
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let len = self.policy.password_min_length.max(12);

        // 每个字符类至少一个
        let mut chars: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL]
            .iter()
            .filter_map(|set| set.choose(&mut rng).copied())
            .collect();

        let alphabet: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL].concat();
        while chars.len() < len {
            chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
        }
        chars.shuffle(&mut rng);

        chars.into_iter().map(char::from).collect()
    }
}
