//! 统一错误模型
//! 定义核心错误分类，以及错误到用户消息的映射

pub mod catalog;

pub use catalog::{ErrorCatalog, ErrorCatalogBuilder, ErrorResponse};

use crate::models::EntityKind;
use serde::Serialize;
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("{entity} {field} already exists: {value}")]
    Conflict {
        entity: EntityKind,
        field: &'static str,
        value: String,
    },

    /// 批量操作中引用的 ID 无法解析
    #[error("{entity} references not found: {}", .ids.join(","))]
    InvalidReference { entity: EntityKind, ids: Vec<String> },

    /// 父节点不存在于合法位置，或会形成环
    #[error("invalid parent {parent_id} for {entity} {id}")]
    InvalidParent {
        entity: EntityKind,
        id: String,
        parent_id: String,
    },

    #[error("{entity} {id} cannot be deleted: {reason}")]
    PreconditionFailed {
        entity: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Invalid operation mode: {0}")]
    InvalidOperationMode(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Deadline exceeded")]
    Timeout,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误分类（对调用方可见的稳定分类）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidReference,
    PreconditionFailed,
    InvalidOperationMode,
    Validation,
    Forbidden,
    Timeout,
    Internal,
}

impl AppError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(entity: EntityKind, field: &'static str, value: impl Into<String>) -> Self {
        AppError::Conflict {
            entity,
            field,
            value: value.into(),
        }
    }

    pub fn precondition(entity: EntityKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::PreconditionFailed {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// 错误所属分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::InvalidReference { .. } | AppError::InvalidParent { .. } => {
                ErrorKind::InvalidReference
            }
            AppError::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            AppError::InvalidOperationMode(_) => ErrorKind::InvalidOperationMode,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Forbidden => ErrorKind::Forbidden,
            AppError::Timeout => ErrorKind::Timeout,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// 消息模板键
    pub fn key(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::InvalidReference { .. } => "invalid_reference",
            AppError::InvalidParent { .. } => "invalid_parent",
            AppError::PreconditionFailed { .. } => "precondition_failed",
            AppError::InvalidOperationMode(_) => "invalid_operation_mode",
            AppError::Validation(_) => "validation",
            AppError::Forbidden => "forbidden",
            AppError::Timeout => "timeout",
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => "internal",
        }
    }

    /// 错误涉及的实体（用于按实体覆盖消息模板）
    pub fn entity(&self) -> Option<EntityKind> {
        match self {
            AppError::NotFound { entity, .. }
            | AppError::Conflict { entity, .. }
            | AppError::InvalidReference { entity, .. }
            | AppError::InvalidParent { entity, .. }
            | AppError::PreconditionFailed { entity, .. } => Some(*entity),
            _ => None,
        }
    }

    /// 模板参数。内部错误不携带任何参数，避免泄露驱动细节
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            AppError::NotFound { entity, id } => {
                vec![("entity", entity.to_string()), ("id", id.clone())]
            }
            AppError::Conflict {
                entity,
                field,
                value,
            } => vec![
                ("entity", entity.to_string()),
                ("field", field.to_string()),
                ("value", value.clone()),
            ],
            AppError::InvalidReference { entity, ids } => {
                vec![("entity", entity.to_string()), ("ids", ids.join(", "))]
            }
            AppError::InvalidParent {
                entity,
                id,
                parent_id,
            } => vec![
                ("entity", entity.to_string()),
                ("id", id.clone()),
                ("parent_id", parent_id.clone()),
            ],
            AppError::PreconditionFailed { entity, id, reason } => vec![
                ("entity", entity.to_string()),
                ("id", id.clone()),
                ("reason", reason.clone()),
            ],
            AppError::InvalidOperationMode(mode) => vec![("mode", mode.clone())],
            AppError::Validation(msg) => vec![("reason", msg.clone())],
            _ => Vec::new(),
        }
    }

    /// 错误码
    pub fn code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::InvalidReference => 422,
            ErrorKind::PreconditionFailed => 412,
            ErrorKind::InvalidOperationMode | ErrorKind::Validation => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::Timeout => 504,
            ErrorKind::Internal => 500,
        }
    }

    /// 校验类错误永远不会被自动重试
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Internal)
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::not_found(EntityKind::Role, "r1").code(), 404);
        assert_eq!(AppError::conflict(EntityKind::Role, "code", "admin").code(), 409);
        assert_eq!(AppError::Forbidden.code(), 403);
        assert_eq!(AppError::InvalidOperationMode("merge".into()).code(), 400);
        assert_eq!(AppError::Timeout.code(), 504);
    }

    #[test]
    fn test_invalid_parent_is_invalid_reference() {
        let err = AppError::InvalidParent {
            entity: EntityKind::Dept,
            id: "d1".into(),
            parent_id: "d2".into(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert_eq!(err.key(), "invalid_parent");
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        let message = error.user_message();
        assert_eq!(message, "Internal server error");
        assert!(!message.contains("sqlx"));
        assert!(error.params().is_empty());
    }

    #[test]
    fn test_validation_errors_not_retryable() {
        assert!(!AppError::not_found(EntityKind::Menu, "m1").is_retryable());
        assert!(!AppError::validation("bad").is_retryable());
        assert!(AppError::Internal("io".into()).is_retryable());
    }
}
