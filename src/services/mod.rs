//! Business logic services layer

pub mod data_scope;
pub mod dept_service;
pub mod hierarchy;
pub mod menu_service;
pub mod permission_service;
pub mod post_service;
pub mod reconciler;
pub mod role_service;
pub mod user_service;

pub use data_scope::{DataScopeFilter, DataScopeResolver};
pub use dept_service::DeptService;
pub use menu_service::MenuService;
pub use permission_service::{EffectivePermissions, PermissionService};
pub use post_service::PostService;
pub use reconciler::{AssociationReconciler, ReconcileMode, ReconcileOutcome};
pub use role_service::RoleService;
pub use user_service::UserService;
