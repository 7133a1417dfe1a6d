//! Association edges between entities

use super::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of many-to-many association. Each kind maps to one edge table whose
/// `(owner, target)` pair is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    RoleMenu,
    /// Department list of a role whose data scope is `custom`
    RoleDept,
    UserRole,
    UserPost,
    UserDept,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::RoleMenu,
        EdgeKind::RoleDept,
        EdgeKind::UserRole,
        EdgeKind::UserPost,
        EdgeKind::UserDept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::RoleMenu => "role_menu",
            EdgeKind::RoleDept => "role_dept",
            EdgeKind::UserRole => "user_role",
            EdgeKind::UserPost => "user_post",
            EdgeKind::UserDept => "user_dept",
        }
    }

    /// Edge table name
    pub fn table(&self) -> &'static str {
        self.as_str()
    }

    pub fn owner(&self) -> EntityKind {
        match self {
            EdgeKind::RoleMenu | EdgeKind::RoleDept => EntityKind::Role,
            EdgeKind::UserRole | EdgeKind::UserPost | EdgeKind::UserDept => EntityKind::User,
        }
    }

    pub fn target(&self) -> EntityKind {
        match self {
            EdgeKind::RoleMenu => EntityKind::Menu,
            EdgeKind::RoleDept | EdgeKind::UserDept => EntityKind::Dept,
            EdgeKind::UserRole => EntityKind::Role,
            EdgeKind::UserPost => EntityKind::Post,
        }
    }

    pub fn owner_column(&self) -> &'static str {
        match self.owner() {
            EntityKind::Role => "role_id",
            _ => "user_id",
        }
    }

    pub fn target_column(&self) -> &'static str {
        match self.target() {
            EntityKind::Menu => "menu_id",
            EntityKind::Dept => "dept_id",
            EntityKind::Role => "role_id",
            EntityKind::Post => "post_id",
            EntityKind::User => "user_id",
        }
    }

    /// Edge kinds whose owner is the given entity
    pub fn owned_by(entity: EntityKind) -> impl Iterator<Item = EdgeKind> {
        Self::ALL.into_iter().filter(move |k| k.owner() == entity)
    }

    /// Edge kinds pointing at the given entity
    pub fn targeting(entity: EntityKind) -> impl Iterator<Item = EdgeKind> {
        Self::ALL.into_iter().filter(move |k| k.target() == entity)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted association edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Edge {
    pub owner_id: String,
    pub target_id: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
}
