//! Database repository layer
//!
//! 存储协作方的接口。`Store` 打开会话，会话在创建时绑定一个租户，所有读写都隐式
//! 带上租户过滤并排除软删除的行，调用方无法绕过。

pub mod memory;
pub mod postgres;
pub mod scope;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::{PgSession, PgStore};

use crate::{
    context::TenantId,
    error::AppError,
    models::{
        association::EdgeKind, dept::Dept, menu::Menu, post::Post, role::Role, user::User,
        EntityKind,
    },
};
use async_trait::async_trait;
use std::collections::HashSet;

/// 存储入口
#[async_trait]
pub trait Store: Send + Sync {
    /// 自动提交的会话，每条语句单独生效
    async fn acquire(&self, tenant: &TenantId) -> Result<Box<dyn Session>, AppError>;

    /// 事务会话，提交前所有写入对外不可见
    async fn begin(&self, tenant: &TenantId) -> Result<Box<dyn Session>, AppError>;
}

/// 绑定租户的会话
#[async_trait]
pub trait Session:
    RoleStore + MenuStore + DeptStore + PostStore + UserStore + EdgeStore + Send
{
    fn tenant(&self) -> &TenantId;

    /// 是否处于事务中
    fn in_transaction(&self) -> bool;

    /// 批量存在性校验，返回在当前范围内可见的 ID 子集
    async fn existing_ids(
        &mut self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<HashSet<String>, AppError>;

    /// 锁定一行直到事务结束，返回它在当前范围内是否可见
    ///
    /// 对同一 owner 的并发调和与删除由此串行化；自动提交会话中锁随语句释放。
    async fn lock_row(&mut self, kind: EntityKind, id: &str) -> Result<bool, AppError>;

    /// 提交（自动提交会话为空操作）
    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    /// 回滚（自动提交会话为空操作）
    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

#[async_trait]
pub trait RoleStore: Send {
    async fn find_role(&mut self, id: &str) -> Result<Option<Role>, AppError>;
    async fn find_roles(&mut self, ids: &[String]) -> Result<Vec<Role>, AppError>;
    async fn find_role_by_code(&mut self, code: &str) -> Result<Option<Role>, AppError>;
    async fn find_role_by_name(&mut self, name: &str) -> Result<Option<Role>, AppError>;
    async fn list_roles(&mut self) -> Result<Vec<Role>, AppError>;
    async fn insert_role(&mut self, role: &Role) -> Result<(), AppError>;
    async fn update_role(&mut self, role: &Role) -> Result<bool, AppError>;
    async fn soft_delete_role(&mut self, id: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait MenuStore: Send {
    async fn find_menu(&mut self, id: &str) -> Result<Option<Menu>, AppError>;
    async fn find_menus(&mut self, ids: &[String]) -> Result<Vec<Menu>, AppError>;
    async fn list_menus(&mut self) -> Result<Vec<Menu>, AppError>;
    async fn count_child_menus(&mut self, id: &str) -> Result<u64, AppError>;
    async fn insert_menu(&mut self, menu: &Menu) -> Result<(), AppError>;
    async fn update_menu(&mut self, menu: &Menu) -> Result<bool, AppError>;
    async fn soft_delete_menu(&mut self, id: &str) -> Result<bool, AppError>;

    /// 删除所有租户中指向该菜单的角色绑定。菜单是全局目录，这是唯一跨租户的写入
    async fn unbind_menu(&mut self, id: &str) -> Result<u64, AppError>;
}

#[async_trait]
pub trait DeptStore: Send {
    async fn find_dept(&mut self, id: &str) -> Result<Option<Dept>, AppError>;
    async fn find_depts(&mut self, ids: &[String]) -> Result<Vec<Dept>, AppError>;
    async fn list_depts(&mut self) -> Result<Vec<Dept>, AppError>;
    /// 同一父部门下按名称查找
    async fn find_dept_by_name(
        &mut self,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<Option<Dept>, AppError>;
    async fn count_child_depts(&mut self, id: &str) -> Result<u64, AppError>;
    async fn insert_dept(&mut self, dept: &Dept) -> Result<(), AppError>;
    async fn update_dept(&mut self, dept: &Dept) -> Result<bool, AppError>;
    async fn soft_delete_dept(&mut self, id: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait PostStore: Send {
    async fn find_post(&mut self, id: &str) -> Result<Option<Post>, AppError>;
    async fn find_post_by_code(&mut self, code: &str) -> Result<Option<Post>, AppError>;
    async fn list_posts(&mut self) -> Result<Vec<Post>, AppError>;
    async fn insert_post(&mut self, post: &Post) -> Result<(), AppError>;
    async fn update_post(&mut self, post: &Post) -> Result<bool, AppError>;
    async fn soft_delete_post(&mut self, id: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait UserStore: Send {
    async fn find_user(&mut self, id: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, AppError>;
    async fn find_users(&mut self, ids: &[String]) -> Result<Vec<User>, AppError>;
    async fn insert_user(&mut self, user: &User) -> Result<(), AppError>;
    async fn update_user(&mut self, user: &User) -> Result<bool, AppError>;
    async fn soft_delete_user(&mut self, id: &str) -> Result<bool, AppError>;
}

/// 关联边。边没有软删除，删除即物理删除
#[async_trait]
pub trait EdgeStore: Send {
    /// 某个 owner 的全部目标 ID，按创建顺序
    async fn edge_targets(&mut self, kind: EdgeKind, owner_id: &str)
        -> Result<Vec<String>, AppError>;

    /// 指向某个目标的全部 owner ID
    async fn edge_owners(&mut self, kind: EdgeKind, target_id: &str)
        -> Result<Vec<String>, AppError>;

    /// 批量插入，已存在的 `(owner, target)` 对被跳过，返回实际插入数量
    async fn insert_edges(
        &mut self,
        kind: EdgeKind,
        owner_id: &str,
        target_ids: &[String],
    ) -> Result<u64, AppError>;

    async fn delete_edges(
        &mut self,
        kind: EdgeKind,
        owner_id: &str,
        target_ids: &[String],
    ) -> Result<u64, AppError>;

    async fn delete_all_edges(&mut self, kind: EdgeKind, owner_id: &str) -> Result<u64, AppError>;

    async fn delete_edges_by_target(
        &mut self,
        kind: EdgeKind,
        target_id: &str,
    ) -> Result<u64, AppError>;
}
