//! 错误消息模板表
//!
//! 进程启动时构建一次，之后只读，通过 `Arc<ErrorCatalog>` 注入到需要渲染错误的地方。
//! 查找顺序：`{entity}.{key}` 优先，其次 `{key}`。

use super::{AppError, ErrorKind};
use serde::Serialize;
use std::collections::HashMap;

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("not_found", "{entity} {id} does not exist"),
    ("conflict", "{entity} with {field} '{value}' already exists"),
    ("invalid_reference", "Unknown {entity} ids: {ids}"),
    ("invalid_parent", "{parent_id} cannot be the parent of {entity} {id}"),
    ("precondition_failed", "{entity} {id} cannot be deleted: {reason}"),
    ("invalid_operation_mode", "Unsupported operation mode '{mode}'"),
    ("validation", "Invalid request: {reason}"),
    ("forbidden", "Access denied"),
    ("timeout", "The request took too long and was cancelled"),
    ("internal", "Internal server error"),
    ("dept.invalid_parent", "Department {parent_id} cannot be the parent of department {id}"),
    ("menu.invalid_parent", "Menu {parent_id} cannot be the parent of menu {id}"),
    ("user.conflict", "Username '{value}' is already taken"),
];

/// 渲染后的错误响应
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
}

/// 不可变的错误模板表
#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    templates: HashMap<String, String>,
}

/// 构建器：仅在启动阶段使用
#[derive(Debug, Default)]
pub struct ErrorCatalogBuilder {
    templates: HashMap<String, String>,
}

impl ErrorCatalogBuilder {
    /// 注册或覆盖一个模板
    pub fn with_template(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(key.into(), template.into());
        self
    }

    pub fn build(self) -> ErrorCatalog {
        ErrorCatalog {
            templates: self.templates,
        }
    }
}

impl ErrorCatalog {
    /// 内置模板
    pub fn builtin() -> Self {
        Self::builder().build()
    }

    /// 以内置模板为基础的构建器
    pub fn builder() -> ErrorCatalogBuilder {
        BUILTIN_TEMPLATES
            .iter()
            .fold(ErrorCatalogBuilder::default(), |b, (k, v)| {
                b.with_template(*k, *v)
            })
    }

    /// 模板数量
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn template(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    /// 渲染错误为用户可见的消息
    pub fn render(&self, err: &AppError) -> ErrorResponse {
        let key = err.key();
        let scoped = err.entity().map(|e| format!("{}.{}", e.as_str(), key));

        let template = scoped
            .as_deref()
            .and_then(|k| self.template(k))
            .or_else(|| self.template(key));

        let message = match template {
            Some(t) => fill(t, &err.params()),
            None => err.user_message(),
        };

        ErrorResponse {
            code: err.code(),
            kind: err.kind(),
            message,
        }
    }
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn fill(template: &str, params: &[(&'static str, String)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
}
