//! Menu (permission node) domain models

use super::Status;
use crate::tree::TreeNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Menu node. Menus form one catalog shared by all tenants.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Menu {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    /// Key checked by authorization, empty for pure navigation nodes
    pub permission_key: Option<String>,
    pub menu_type: MenuType,
    pub path: Option<String>,
    pub component: Option<String>,
    pub icon: Option<String>,
    pub sort: i32,
    pub status: Status,
    pub visible: bool,
    pub keep_alive: bool,
    pub always_show: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Menu {
    /// Non-empty permission key
    pub fn permission(&self) -> Option<&str> {
        self.permission_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl TreeNode for Menu {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn sort_key(&self) -> (i32, DateTime<Utc>) {
        (self.sort, self.created_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "menu_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MenuType {
    Directory,
    Menu,
    Button,
}

/// Create menu request
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateMenuRequest {
    pub parent_id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(max = 128))]
    pub permission_key: Option<String>,
    pub menu_type: MenuType,
    pub path: Option<String>,
    pub component: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub sort: i32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub keep_alive: bool,
    #[serde(default)]
    pub always_show: bool,
}

/// Update menu request. `parent_id` set to an empty string or "0" moves the
/// node to the root.
#[derive(Debug, Clone, Default, Deserialize, validator::Validate)]
pub struct UpdateMenuRequest {
    pub parent_id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(length(max = 128))]
    pub permission_key: Option<String>,
    pub menu_type: Option<MenuType>,
    pub path: Option<String>,
    pub component: Option<String>,
    pub icon: Option<String>,
    pub sort: Option<i32>,
    pub status: Option<Status>,
    pub visible: Option<bool>,
    pub keep_alive: Option<bool>,
    pub always_show: Option<bool>,
}

fn default_true() -> bool {
    true
}
