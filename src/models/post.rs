//! Post (job position) domain models

use super::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub tenant_id: String,
    pub code: String,
    pub name: String,
    pub sort: i32,
    pub status: Status,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[serde(default)]
    pub sort: i32,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, validator::Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    pub sort: Option<i32>,
    pub status: Option<Status>,
    pub remark: Option<String>,
}
