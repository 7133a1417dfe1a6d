//! User domain models

use super::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub tenant_id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,

    // Profile
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    pub status: Status,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// User with its role/post/department bindings
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub role_ids: Vec<String>,
    pub post_ids: Vec<String>,
    pub dept_ids: Vec<String>,
}

/// Create user request
#[derive(Debug, Clone, Deserialize, validator::Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    #[validate(length(max = 64))]
    pub nickname: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[serde(default)]
    pub role_ids: Vec<String>,
    #[serde(default)]
    pub post_ids: Vec<String>,
    #[serde(default)]
    pub dept_ids: Vec<String>,
}

/// Update user request
#[derive(Debug, Clone, Default, Deserialize, validator::Validate)]
pub struct UpdateUserRequest {
    #[validate(length(max = 64))]
    pub nickname: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub status: Option<Status>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn request(username: &str, email: Option<&str>) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            password: "Passw0rdX".to_string(),
            nickname: None,
            email: email.map(str::to_string),
            phone: None,
            role_ids: vec![],
            post_ids: vec![],
            dept_ids: vec![],
        }
    }

    #[test]
    fn test_create_user_request_validation() {
        assert!(request("alice", Some("alice@example.com")).validate().is_ok());
        assert!(request("a", None).validate().is_err());
        assert!(request("alice", Some("not-an-email")).validate().is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: "u1".into(),
            tenant_id: "t1".into(),
            username: "alice".into(),
            password_hash: "$argon2id$secret".into(),
            nickname: None,
            email: None,
            phone: None,
            status: Status::Enabled,
            password_changed_at: now,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
