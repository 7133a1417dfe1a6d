//! 请求上下文
//! 由身份/会话协作方提供：当前租户、当前用户与截止时间

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// 默认的平台租户
pub const PLATFORM_TENANT: &str = "platform";

/// 租户标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// 已认证请求的上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    /// 发起操作的用户
    pub user_id: String,
    /// 存储调用的截止时间
    pub deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<TenantId>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            deadline: None,
        }
    }

    /// 从现在起 `timeout` 后截止
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 调用方是否属于给定的平台租户
    pub fn is_platform(&self, platform: &TenantId) -> bool {
        &self.tenant_id == platform
    }

    /// 截止时间是否已过
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
