//! 内存存储实现
//!
//! 与 Postgres 实现遵守相同的约束：关联边 `(owner, target)` 唯一、租户隔离、软删除
//! 过滤。事务会话持有整张表的锁，写入先落在暂存副本上，提交时整体替换，回滚时丢弃，
//! 因此同一时刻只有一个事务（可串行化）。

use super::{
    scope::Scoped, DeptStore, EdgeStore, MenuStore, PostStore, RoleStore, Session, Store,
    UserStore,
};
use crate::{
    context::TenantId,
    error::AppError,
    models::{
        association::{Edge, EdgeKind},
        dept::Dept,
        menu::Menu,
        post::Post,
        role::Role,
        user::User,
        EntityKind,
    },
    tree::TreeNode,
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 故障注入点，用于验证回滚
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// 批量插入关联边
    EdgeInsert,
    /// 删除关联边
    EdgeDelete,
    /// 事务提交
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    roles: Vec<Role>,
    menus: Vec<Menu>,
    depts: Vec<Dept>,
    posts: Vec<Post>,
    users: Vec<User>,
    /// 按插入顺序保存，即创建顺序
    edges: HashMap<EdgeKind, Vec<Edge>>,
}

impl Tables {
    fn existing_ids(&self, kind: EntityKind, tenant: &TenantId, ids: &[String]) -> HashSet<String> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let visible: Vec<&str> = match kind {
            EntityKind::Role => visible_ids(&self.roles, tenant),
            EntityKind::Menu => visible_ids(&self.menus, tenant),
            EntityKind::Dept => visible_ids(&self.depts, tenant),
            EntityKind::Post => visible_ids(&self.posts, tenant),
            EntityKind::User => visible_ids(&self.users, tenant),
        };

        visible
            .into_iter()
            .filter(|id| wanted.contains(id))
            .map(str::to_string)
            .collect()
    }
}

/// 按主键访问内存行
trait Keyed {
    fn key(&self) -> &str;
}

macro_rules! keyed_row {
    ($($ty:ty),*) => {
        $(
            impl Keyed for $ty {
                fn key(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

keyed_row!(Role, Menu, Dept, Post, User);

fn visible_ids<'a, T: Keyed + Scoped>(rows: &'a [T], tenant: &TenantId) -> Vec<&'a str> {
    rows.iter()
        .filter(|r| r.visible_to(tenant))
        .map(Keyed::key)
        .collect()
}

fn find_visible<T: Keyed + Scoped + Clone>(rows: &[T], tenant: &TenantId, id: &str) -> Option<T> {
    rows.iter()
        .find(|r| r.key() == id && r.visible_to(tenant))
        .cloned()
}

fn find_many<T: Keyed + Scoped + Clone>(rows: &[T], tenant: &TenantId, ids: &[String]) -> Vec<T> {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    rows.iter()
        .filter(|r| wanted.contains(r.key()) && r.visible_to(tenant))
        .cloned()
        .collect()
}

fn list_sorted<T: TreeNode + Scoped + Clone>(rows: &[T], tenant: &TenantId) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().filter(|r| r.visible_to(tenant)).cloned().collect();
    out.sort_by_key(|r| r.sort_key());
    out
}

fn count_children<T: TreeNode + Scoped>(rows: &[T], tenant: &TenantId, id: &str) -> u64 {
    rows.iter()
        .filter(|r| r.visible_to(tenant) && r.parent_id() == Some(id))
        .count() as u64
}

/// 替换可见行，返回是否命中
fn replace_visible<T: Keyed + Scoped>(rows: &mut [T], tenant: &TenantId, row: T) -> bool {
    match rows
        .iter_mut()
        .find(|r| r.key() == row.key() && r.visible_to(tenant))
    {
        Some(slot) => {
            *slot = row;
            true
        }
        None => false,
    }
}

macro_rules! soft_delete_row {
    ($rows:expr, $tenant:expr, $id:expr) => {{
        let now = Utc::now();
        match $rows
            .iter_mut()
            .find(|r| r.id == $id && r.visible_to($tenant))
        {
            Some(row) => {
                row.deleted_at = Some(now);
                row.updated_at = now;
                true
            }
            None => false,
        }
    }};
}

/// 进程内存储，测试与本地开发使用
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_points: Arc<std::sync::Mutex<HashSet<FailPoint>>>,
    latency: Option<Duration>,
    commit_latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次存储调用前等待 `latency`，模拟慢存储
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 事务提交前额外等待，模拟慢提交
    pub fn with_commit_latency(mut self, latency: Duration) -> Self {
        self.commit_latency = Some(latency);
        self
    }

    /// 激活故障注入点，直到 [`MemoryStore::clear_fail_points`]
    pub fn fail_on(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.insert(point);
        }
    }

    pub fn clear_fail_points(&self) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.clear();
        }
    }

    fn check(&self, point: FailPoint) -> Result<(), AppError> {
        let armed = self
            .fail_points
            .lock()
            .map(|points| points.contains(&point))
            .unwrap_or(false);

        if armed {
            return Err(AppError::Internal(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn acquire(&self, tenant: &TenantId) -> Result<Box<dyn Session>, AppError> {
        Ok(Box::new(MemorySession {
            store: self.clone(),
            tenant: tenant.clone(),
            mode: Mode::Auto,
        }))
    }

    async fn begin(&self, tenant: &TenantId) -> Result<Box<dyn Session>, AppError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        tracing::trace!(tenant_id = %tenant, "Memory transaction started");

        Ok(Box::new(MemorySession {
            store: self.clone(),
            tenant: tenant.clone(),
            mode: Mode::Tx { guard, staged },
        }))
    }
}

enum Mode {
    /// 每次调用单独加锁
    Auto,
    /// 持有表锁，写入暂存副本
    Tx {
        guard: OwnedMutexGuard<Tables>,
        staged: Tables,
    },
}

/// 内存会话
pub struct MemorySession {
    store: MemoryStore,
    tenant: TenantId,
    mode: Mode,
}

impl MemorySession {
    async fn pause(&self) {
        if let Some(latency) = self.store.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn read<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&Tables, &TenantId) -> R + Send,
        R: Send,
    {
        self.pause().await;
        match &self.mode {
            Mode::Auto => {
                let tables = self.store.tables.lock().await;
                f(&tables, &self.tenant)
            }
            Mode::Tx { staged, .. } => f(staged, &self.tenant),
        }
    }

    /// 闭包必须先校验再修改，失败时不留下部分写入
    async fn write<R, F>(&mut self, f: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut Tables, &TenantId) -> Result<R, AppError> + Send,
        R: Send,
    {
        self.pause().await;
        match &mut self.mode {
            Mode::Auto => {
                let mut tables = self.store.tables.lock().await;
                f(&mut tables, &self.tenant)
            }
            Mode::Tx { staged, .. } => f(staged, &self.tenant),
        }
    }
}

#[async_trait]
impl RoleStore for MemorySession {
    async fn find_role(&mut self, id: &str) -> Result<Option<Role>, AppError> {
        Ok(self.read(|t, tenant| find_visible(&t.roles, tenant, id)).await)
    }

    async fn find_roles(&mut self, ids: &[String]) -> Result<Vec<Role>, AppError> {
        Ok(self.read(|t, tenant| find_many(&t.roles, tenant, ids)).await)
    }

    async fn find_role_by_code(&mut self, code: &str) -> Result<Option<Role>, AppError> {
        Ok(self
            .read(|t, tenant| {
                t.roles
                    .iter()
                    .find(|r| r.code == code && r.visible_to(tenant))
                    .cloned()
            })
            .await)
    }

    async fn find_role_by_name(&mut self, name: &str) -> Result<Option<Role>, AppError> {
        Ok(self
            .read(|t, tenant| {
                t.roles
                    .iter()
                    .find(|r| r.name == name && r.visible_to(tenant))
                    .cloned()
            })
            .await)
    }

    async fn list_roles(&mut self) -> Result<Vec<Role>, AppError> {
        Ok(self
            .read(|t, tenant| {
                let mut roles: Vec<Role> =
                    t.roles.iter().filter(|r| r.visible_to(tenant)).cloned().collect();
                roles.sort_by_key(|r| (r.sort, r.created_at));
                roles
            })
            .await)
    }

    async fn insert_role(&mut self, role: &Role) -> Result<(), AppError> {
        let mut role = role.clone();
        self.write(move |t, tenant| {
            role.tenant_id = tenant.as_str().to_string();
            t.roles.push(role);
            Ok(())
        })
        .await
    }

    async fn update_role(&mut self, role: &Role) -> Result<bool, AppError> {
        let mut role = role.clone();
        role.updated_at = Utc::now();
        self.write(move |t, tenant| {
            role.tenant_id = tenant.as_str().to_string();
            Ok(replace_visible(&mut t.roles, tenant, role))
        })
        .await
    }

    async fn soft_delete_role(&mut self, id: &str) -> Result<bool, AppError> {
        self.write(|t, tenant| Ok(soft_delete_row!(t.roles, tenant, id)))
            .await
    }
}

#[async_trait]
impl MenuStore for MemorySession {
    async fn find_menu(&mut self, id: &str) -> Result<Option<Menu>, AppError> {
        Ok(self.read(|t, tenant| find_visible(&t.menus, tenant, id)).await)
    }

    async fn find_menus(&mut self, ids: &[String]) -> Result<Vec<Menu>, AppError> {
        Ok(self.read(|t, tenant| find_many(&t.menus, tenant, ids)).await)
    }

    async fn list_menus(&mut self) -> Result<Vec<Menu>, AppError> {
        Ok(self.read(|t, tenant| list_sorted(&t.menus, tenant)).await)
    }

    async fn count_child_menus(&mut self, id: &str) -> Result<u64, AppError> {
        Ok(self.read(|t, tenant| count_children(&t.menus, tenant, id)).await)
    }

    async fn insert_menu(&mut self, menu: &Menu) -> Result<(), AppError> {
        let menu = menu.clone();
        self.write(move |t, _| {
            t.menus.push(menu);
            Ok(())
        })
        .await
    }

    async fn update_menu(&mut self, menu: &Menu) -> Result<bool, AppError> {
        let mut menu = menu.clone();
        menu.updated_at = Utc::now();
        self.write(move |t, tenant| Ok(replace_visible(&mut t.menus, tenant, menu)))
            .await
    }

    async fn soft_delete_menu(&mut self, id: &str) -> Result<bool, AppError> {
        self.write(|t, tenant| Ok(soft_delete_row!(t.menus, tenant, id)))
            .await
    }

    async fn unbind_menu(&mut self, id: &str) -> Result<u64, AppError> {
        self.store.check(FailPoint::EdgeDelete)?;

        self.write(|t, _| Ok(retain_edges(t, EdgeKind::RoleMenu, |e| e.target_id == id)))
            .await
    }
}

#[async_trait]
impl DeptStore for MemorySession {
    async fn find_dept(&mut self, id: &str) -> Result<Option<Dept>, AppError> {
        Ok(self.read(|t, tenant| find_visible(&t.depts, tenant, id)).await)
    }

    async fn find_depts(&mut self, ids: &[String]) -> Result<Vec<Dept>, AppError> {
        Ok(self.read(|t, tenant| find_many(&t.depts, tenant, ids)).await)
    }

    async fn list_depts(&mut self) -> Result<Vec<Dept>, AppError> {
        Ok(self.read(|t, tenant| list_sorted(&t.depts, tenant)).await)
    }

    async fn find_dept_by_name(
        &mut self,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<Option<Dept>, AppError> {
        Ok(self
            .read(|t, tenant| {
                t.depts
                    .iter()
                    .find(|d| {
                        d.visible_to(tenant) && d.parent_id.as_deref() == parent_id && d.name == name
                    })
                    .cloned()
            })
            .await)
    }

    async fn count_child_depts(&mut self, id: &str) -> Result<u64, AppError> {
        Ok(self.read(|t, tenant| count_children(&t.depts, tenant, id)).await)
    }

    async fn insert_dept(&mut self, dept: &Dept) -> Result<(), AppError> {
        let mut dept = dept.clone();
        self.write(move |t, tenant| {
            dept.tenant_id = tenant.as_str().to_string();
            t.depts.push(dept);
            Ok(())
        })
        .await
    }

    async fn update_dept(&mut self, dept: &Dept) -> Result<bool, AppError> {
        let mut dept = dept.clone();
        dept.updated_at = Utc::now();
        self.write(move |t, tenant| {
            dept.tenant_id = tenant.as_str().to_string();
            Ok(replace_visible(&mut t.depts, tenant, dept))
        })
        .await
    }

    async fn soft_delete_dept(&mut self, id: &str) -> Result<bool, AppError> {
        self.write(|t, tenant| Ok(soft_delete_row!(t.depts, tenant, id)))
            .await
    }
}

#[async_trait]
impl PostStore for MemorySession {
    async fn find_post(&mut self, id: &str) -> Result<Option<Post>, AppError> {
        Ok(self.read(|t, tenant| find_visible(&t.posts, tenant, id)).await)
    }

    async fn find_post_by_code(&mut self, code: &str) -> Result<Option<Post>, AppError> {
        Ok(self
            .read(|t, tenant| {
                t.posts
                    .iter()
                    .find(|p| p.code == code && p.visible_to(tenant))
                    .cloned()
            })
            .await)
    }

    async fn list_posts(&mut self) -> Result<Vec<Post>, AppError> {
        Ok(self
            .read(|t, tenant| {
                let mut posts: Vec<Post> =
                    t.posts.iter().filter(|p| p.visible_to(tenant)).cloned().collect();
                posts.sort_by_key(|p| (p.sort, p.created_at));
                posts
            })
            .await)
    }

    async fn insert_post(&mut self, post: &Post) -> Result<(), AppError> {
        let mut post = post.clone();
        self.write(move |t, tenant| {
            post.tenant_id = tenant.as_str().to_string();
            t.posts.push(post);
            Ok(())
        })
        .await
    }

    async fn update_post(&mut self, post: &Post) -> Result<bool, AppError> {
        let mut post = post.clone();
        post.updated_at = Utc::now();
        self.write(move |t, tenant| {
            post.tenant_id = tenant.as_str().to_string();
            Ok(replace_visible(&mut t.posts, tenant, post))
        })
        .await
    }

    async fn soft_delete_post(&mut self, id: &str) -> Result<bool, AppError> {
        self.write(|t, tenant| Ok(soft_delete_row!(t.posts, tenant, id)))
            .await
    }
}

#[async_trait]
impl UserStore for MemorySession {
    async fn find_user(&mut self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.read(|t, tenant| find_visible(&t.users, tenant, id)).await)
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .read(|t, tenant| {
                t.users
                    .iter()
                    .find(|u| u.username == username && u.visible_to(tenant))
                    .cloned()
            })
            .await)
    }

    async fn find_users(&mut self, ids: &[String]) -> Result<Vec<User>, AppError> {
        Ok(self.read(|t, tenant| find_many(&t.users, tenant, ids)).await)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        let mut user = user.clone();
        self.write(move |t, tenant| {
            user.tenant_id = tenant.as_str().to_string();
            t.users.push(user);
            Ok(())
        })
        .await
    }

    async fn update_user(&mut self, user: &User) -> Result<bool, AppError> {
        let mut user = user.clone();
        user.updated_at = Utc::now();
        self.write(move |t, tenant| {
            user.tenant_id = tenant.as_str().to_string();
            Ok(replace_visible(&mut t.users, tenant, user))
        })
        .await
    }

    async fn soft_delete_user(&mut self, id: &str) -> Result<bool, AppError> {
        self.write(|t, tenant| Ok(soft_delete_row!(t.users, tenant, id)))
            .await
    }
}

#[async_trait]
impl EdgeStore for MemorySession {
    async fn edge_targets(
        &mut self,
        kind: EdgeKind,
        owner_id: &str,
    ) -> Result<Vec<String>, AppError> {
        Ok(self
            .read(|t, tenant| {
                t.edges
                    .get(&kind)
                    .into_iter()
                    .flatten()
                    .filter(|e| e.owner_id == owner_id && e.visible_to(tenant))
                    .map(|e| e.target_id.clone())
                    .collect()
            })
            .await)
    }

    async fn edge_owners(
        &mut self,
        kind: EdgeKind,
        target_id: &str,
    ) -> Result<Vec<String>, AppError> {
        Ok(self
            .read(|t, tenant| {
                t.edges
                    .get(&kind)
                    .into_iter()
                    .flatten()
                    .filter(|e| e.target_id == target_id && e.visible_to(tenant))
                    .map(|e| e.owner_id.clone())
                    .collect()
            })
            .await)
    }

    async fn insert_edges(
        &mut self,
        kind: EdgeKind,
        owner_id: &str,
        target_ids: &[String],
    ) -> Result<u64, AppError> {
        if target_ids.is_empty() {
            return Ok(0);
        }
        self.store.check(FailPoint::EdgeInsert)?;

        self.write(|t, tenant| {
            let edges = t.edges.entry(kind).or_default();

            // 与唯一约束上的 ON CONFLICT DO NOTHING 一致：已存在的对被跳过
            let mut pairs: HashSet<String> = edges
                .iter()
                .filter(|e| e.owner_id == owner_id)
                .map(|e| e.target_id.clone())
                .collect();

            let now = Utc::now();
            let mut inserted = 0;
            for target in target_ids {
                if !pairs.insert(target.clone()) {
                    continue;
                }
                edges.push(Edge {
                    owner_id: owner_id.to_string(),
                    target_id: target.clone(),
                    tenant_id: tenant.as_str().to_string(),
                    created_at: now,
                });
                inserted += 1;
            }
            Ok(inserted)
        })
        .await
    }

    async fn delete_edges(
        &mut self,
        kind: EdgeKind,
        owner_id: &str,
        target_ids: &[String],
    ) -> Result<u64, AppError> {
        if target_ids.is_empty() {
            return Ok(0);
        }
        self.store.check(FailPoint::EdgeDelete)?;

        let doomed: HashSet<String> = target_ids.iter().cloned().collect();
        self.write(move |t, tenant| {
            Ok(retain_edges(t, kind, |e| {
                e.visible_to(tenant) && e.owner_id == owner_id && doomed.contains(&e.target_id)
            }))
        })
        .await
    }

    async fn delete_all_edges(&mut self, kind: EdgeKind, owner_id: &str) -> Result<u64, AppError> {
        self.store.check(FailPoint::EdgeDelete)?;

        self.write(|t, tenant| {
            Ok(retain_edges(t, kind, |e| {
                e.visible_to(tenant) && e.owner_id == owner_id
            }))
        })
        .await
    }

    async fn delete_edges_by_target(
        &mut self,
        kind: EdgeKind,
        target_id: &str,
    ) -> Result<u64, AppError> {
        self.store.check(FailPoint::EdgeDelete)?;

        self.write(|t, tenant| {
            Ok(retain_edges(t, kind, |e| {
                e.visible_to(tenant) && e.target_id == target_id
            }))
        })
        .await
    }
}

/// 删除满足条件的边，返回删除数量
fn retain_edges(t: &mut Tables, kind: EdgeKind, doomed: impl Fn(&Edge) -> bool) -> u64 {
    let Some(edges) = t.edges.get_mut(&kind) else {
        return 0;
    };
    let before = edges.len();
    edges.retain(|e| !doomed(e));
    (before - edges.len()) as u64
}

#[async_trait]
impl Session for MemorySession {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    fn in_transaction(&self) -> bool {
        matches!(self.mode, Mode::Tx { .. })
    }

    async fn existing_ids(
        &mut self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<HashSet<String>, AppError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        Ok(self.read(|t, tenant| t.existing_ids(kind, tenant, ids)).await)
    }

    /// 事务会话已独占整张表，只需确认可见
    async fn lock_row(&mut self, kind: EntityKind, id: &str) -> Result<bool, AppError> {
        let found = self.existing_ids(kind, &[id.to_string()]).await?;
        Ok(!found.is_empty())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemorySession {
            store,
            tenant,
            mode,
        } = *self;

        if let Mode::Tx { mut guard, staged } = mode {
            if let Some(latency) = store.commit_latency {
                tokio::time::sleep(latency).await;
            }
            store.check(FailPoint::Commit)?;
            *guard = staged;
            tracing::trace!(tenant_id = %tenant, "Memory transaction committed");
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        if self.in_transaction() {
            tracing::debug!(tenant_id = %self.tenant, "Memory transaction rolled back");
        }
        // 丢弃暂存副本并释放锁
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    fn post(id: &str, code: &str) -> Post {
        let now = Utc::now();
        Post {
            id: id.into(),
            tenant_id: String::new(),
            code: code.into(),
            name: code.into(),
            sort: 0,
            status: Status::Enabled,
            remark: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_tenant_scope_and_soft_delete() {
        let store = MemoryStore::new();
        let t1 = TenantId::new("t1");
        let t2 = TenantId::new("t2");

        let mut s1 = store.acquire(&t1).await.unwrap();
        s1.insert_post(&post("p1", "dev")).await.unwrap();
        assert!(s1.find_post("p1").await.unwrap().is_some());

        let mut s2 = store.acquire(&t2).await.unwrap();
        assert!(s2.find_post("p1").await.unwrap().is_none());
        assert!(!s2.soft_delete_post("p1").await.unwrap());

        assert!(s1.soft_delete_post("p1").await.unwrap());
        assert!(s1.find_post("p1").await.unwrap().is_none());
        assert!(s1.find_post_by_code("dev").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_edge_is_skipped() {
        let store = MemoryStore::new();
        let tenant = TenantId::new("t1");
        let mut s = store.acquire(&tenant).await.unwrap();

        s.insert_edges(EdgeKind::UserRole, "u1", &["r1".into()])
            .await
            .unwrap();
        let inserted = s
            .insert_edges(EdgeKind::UserRole, "u1", &["r2".into(), "r1".into(), "r2".into()])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(
            s.edge_targets(EdgeKind::UserRole, "u1").await.unwrap(),
            vec!["r1".to_string(), "r2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_lock_row_respects_scope() {
        let store = MemoryStore::new();
        let mut tx = store.begin(&TenantId::new("t1")).await.unwrap();
        tx.insert_post(&post("p1", "dev")).await.unwrap();
        assert!(tx.lock_row(EntityKind::Post, "p1").await.unwrap());
        assert!(!tx.lock_row(EntityKind::Post, "p2").await.unwrap());
        tx.commit().await.unwrap();

        let mut other = store.begin(&TenantId::new("t2")).await.unwrap();
        assert!(!other.lock_row(EntityKind::Post, "p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let store = MemoryStore::new();
        let tenant = TenantId::new("t1");

        let mut tx = store.begin(&tenant).await.unwrap();
        assert!(tx.in_transaction());
        tx.insert_edges(EdgeKind::UserPost, "u1", &["p1".into()])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let mut s = store.acquire(&tenant).await.unwrap();
        assert!(s.edge_targets(EdgeKind::UserPost, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_fail_point_keeps_previous_state() {
        let store = MemoryStore::new();
        let tenant = TenantId::new("t1");

        let mut tx = store.begin(&tenant).await.unwrap();
        tx.insert_edges(EdgeKind::UserPost, "u1", &["p1".into()])
            .await
            .unwrap();
        store.fail_on(FailPoint::Commit);
        assert!(tx.commit().await.is_err());
        store.clear_fail_points();

        let mut s = store.acquire(&tenant).await.unwrap();
        assert!(s.edge_targets(EdgeKind::UserPost, "u1").await.unwrap().is_empty());
    }
}
