//! Role and data-scope domain models

use super::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    /// Stable code used in authorization results, unique per tenant
    pub code: String,
    pub sort: i32,
    pub status: Status,
    pub data_scope: DataScope,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Row-level data visibility granted by a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "data_scope", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DataScope {
    /// Only rows created by the user
    #[default]
    Own,
    /// Rows of the user's departments
    Dept,
    /// Rows of the user's departments and all their descendants
    DeptAndChildren,
    /// Every row in the tenant
    All,
    /// Rows of an explicit department list bound to the role
    Custom,
}

impl DataScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataScope::Own => "own",
            DataScope::Dept => "dept",
            DataScope::DeptAndChildren => "dept_and_children",
            DataScope::All => "all",
            DataScope::Custom => "custom",
        }
    }
}

impl fmt::Display for DataScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "own" => Ok(DataScope::Own),
            "dept" => Ok(DataScope::Dept),
            "dept_and_children" => Ok(DataScope::DeptAndChildren),
            "all" => Ok(DataScope::All),
            "custom" => Ok(DataScope::Custom),
            other => Err(format!("unknown data scope: {}", other)),
        }
    }
}

/// Role with its bindings
#[derive(Debug, Clone, Serialize)]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub menu_ids: Vec<String>,
    /// Only populated when `data_scope` is `custom`
    pub dept_ids: Vec<String>,
}

/// Create role request
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub data_scope: DataScope,
    pub remark: Option<String>,
    #[serde(default)]
    pub menu_ids: Vec<String>,
}

/// Update role request
#[derive(Debug, Clone, Default, Deserialize, validator::Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub code: Option<String>,
    pub sort: Option<i32>,
    pub status: Option<Status>,
    pub remark: Option<String>,
}

/// Data scope assignment request
#[derive(Debug, Clone, Deserialize)]
pub struct DataScopeRequest {
    pub data_scope: DataScope,
    #[serde(default)]
    pub dept_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_scope_round_trips_through_str() {
        for scope in [
            DataScope::Own,
            DataScope::Dept,
            DataScope::DeptAndChildren,
            DataScope::All,
            DataScope::Custom,
        ] {
            assert_eq!(scope.as_str().parse::<DataScope>().unwrap(), scope);
        }
        assert!("everything".parse::<DataScope>().is_err());
    }

    #[test]
    fn test_create_role_request_validation() {
        use validator::Validate;

        let req = CreateRoleRequest {
            name: "".into(),
            code: "admin".into(),
            sort: 0,
            data_scope: DataScope::All,
            remark: None,
            menu_ids: vec![],
        };
        assert!(req.validate().is_err());
    }
}
