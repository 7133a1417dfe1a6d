//! 多租户管理后台核心
//! 角色、菜单、部门、岗位、用户之间的授权与关联管理

pub mod app;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod ids;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;
pub mod transaction;
pub mod tree;

pub use app::{AdminCore, AdminCoreBuilder};
pub use context::{RequestContext, TenantId};
pub use error::AppError;
