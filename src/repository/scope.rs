//! 租户范围与软删除过滤
//!
//! 所有仓库查询共用的谓词，只在这里书写一次：
//! - Postgres 查询从 [`scoped_select`] 开始，或者在 WHERE 子句中调用 [`push_scope`]
//! - 内存存储使用 [`Scoped::visible_to`]

use crate::{
    context::TenantId,
    models::{
        association::{Edge, EdgeKind},
        dept::Dept,
        menu::Menu,
        post::Post,
        role::Role,
        user::User,
        EntityKind,
    },
};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

/// 表的过滤规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub tenant_scoped: bool,
    pub soft_delete: bool,
}

impl Table {
    pub const ROLES: Table = Table::entity("sys_role", true);
    pub const MENUS: Table = Table::entity("sys_menu", false);
    pub const DEPTS: Table = Table::entity("sys_dept", true);
    pub const POSTS: Table = Table::entity("sys_post", true);
    pub const USERS: Table = Table::entity("sys_user", true);

    const fn entity(name: &'static str, tenant_scoped: bool) -> Self {
        Table {
            name,
            tenant_scoped,
            soft_delete: true,
        }
    }

    pub fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Role => Table::ROLES,
            EntityKind::Menu => Table::MENUS,
            EntityKind::Dept => Table::DEPTS,
            EntityKind::Post => Table::POSTS,
            EntityKind::User => Table::USERS,
        }
    }

    /// 关联边表：按租户隔离，物理删除
    pub fn edges(kind: EdgeKind) -> Self {
        Table {
            name: kind.table(),
            tenant_scoped: true,
            soft_delete: false,
        }
    }
}

/// `SELECT {columns} FROM {table} WHERE <scope>`，调用方继续追加 `AND ...`
pub fn scoped_select(table: Table, columns: &str, tenant: &TenantId) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {} WHERE ", columns, table.name));
    push_scope(&mut qb, table, tenant);
    qb
}

/// 追加范围谓词
pub fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, table: Table, tenant: &TenantId) {
    let mut first = true;

    if table.soft_delete {
        qb.push("deleted_at IS NULL");
        first = false;
    }

    if table.tenant_scoped {
        if !first {
            qb.push(" AND ");
        }
        qb.push("tenant_id = ");
        qb.push_bind(tenant.as_str().to_string());
        first = false;
    }

    if first {
        qb.push("TRUE");
    }
}

/// 内存中的行是否对某租户可见
pub trait Scoped {
    /// 全局行返回 `None`
    fn tenant_id(&self) -> Option<&str>;
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn visible_to(&self, tenant: &TenantId) -> bool {
        self.deleted_at().is_none() && self.tenant_id().map_or(true, |t| t == tenant.as_str())
    }
}

macro_rules! tenant_scoped_row {
    ($($ty:ty),*) => {
        $(
            impl Scoped for $ty {
                fn tenant_id(&self) -> Option<&str> {
                    Some(&self.tenant_id)
                }

                fn deleted_at(&self) -> Option<DateTime<Utc>> {
                    self.deleted_at
                }
            }
        )*
    };
}

tenant_scoped_row!(Role, Dept, Post, User);

impl Scoped for Menu {
    fn tenant_id(&self) -> Option<&str> {
        None
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

impl Scoped for Edge {
    fn tenant_id(&self) -> Option<&str> {
        Some(&self.tenant_id)
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_select_tenant_table() {
        let tenant = TenantId::new("t1");
        let qb = scoped_select(Table::ROLES, "*", &tenant);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM sys_role WHERE deleted_at IS NULL AND tenant_id = $1"
        );
    }

    #[test]
    fn test_scoped_select_global_table() {
        let tenant = TenantId::new("t1");
        let qb = scoped_select(Table::MENUS, "id", &tenant);
        assert_eq!(qb.sql(), "SELECT id FROM sys_menu WHERE deleted_at IS NULL");
    }

    #[test]
    fn test_edge_scope() {
        let tenant = TenantId::new("t1");
        let qb = scoped_select(Table::edges(EdgeKind::UserRole), "role_id", &tenant);
        assert_eq!(qb.sql(), "SELECT role_id FROM user_role WHERE tenant_id = $1");
    }

    #[test]
    fn test_edge_visibility() {
        let edge = Edge {
            owner_id: "u1".into(),
            target_id: "r1".into(),
            tenant_id: "t1".into(),
            created_at: Utc::now(),
        };
        assert!(edge.visible_to(&TenantId::new("t1")));
        assert!(!edge.visible_to(&TenantId::new("t2")));
    }
}
