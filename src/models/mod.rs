//! 数据模型模块
//! 组织实体（角色、菜单、部门、岗位、用户）与关联边

pub mod association;
pub mod dept;
pub mod menu;
pub mod post;
pub mod role;
pub mod user;

use serde::{Deserialize, Serialize};
use std::fmt;

/// 实体类型，用于 ID 生成、错误上下文与存在性校验
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Role,
    Menu,
    Dept,
    Post,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Role => "role",
            EntityKind::Menu => "menu",
            EntityKind::Dept => "dept",
            EntityKind::Post => "post",
            EntityKind::User => "user",
        }
    }

    /// 菜单是全局共享的目录，不带租户列
    pub fn is_tenant_scoped(&self) -> bool {
        !matches!(self, EntityKind::Menu)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 启用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entity_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
}

impl Status {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Status::Enabled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Enabled => write!(f, "enabled"),
            Status::Disabled => write!(f, "disabled"),
        }
    }
}
