//! Department domain models

use super::Status;
use crate::tree::TreeNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Department
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dept {
    pub id: String,
    pub tenant_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub sort: i32,
    pub leader: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TreeNode for Dept {
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

/// Create department request
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateDeptRequest {
    pub parent_id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[serde(default)]
    pub sort: i32,
    pub leader: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Update department request. `parent_id` set to an empty string or "0"
/// moves the department to the root.
#[derive(Debug, Clone, Default, Deserialize, validator::Validate)]
pub struct UpdateDeptRequest {
    pub parent_id: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    pub sort: Option<i32>,
    pub leader: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub status: Option<Status>,
}
