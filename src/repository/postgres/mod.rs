//! PostgreSQL 存储实现

mod dept_repo;
mod edge_repo;
mod menu_repo;
mod post_repo;
mod role_repo;
mod user_repo;

use super::{
    scope::{push_scope, scoped_select, Table},
    Session, Store,
};
use crate::{context::TenantId, error::AppError, models::EntityKind};
use async_trait::async_trait;
use sqlx::{
    pool::PoolConnection, postgres::PgRow, FromRow, PgConnection, PgPool, Postgres, QueryBuilder,
    Transaction,
};
use std::collections::HashSet;

/// 部分唯一索引：约束名、实体与字段
const UNIQUE_INDEXES: [(&str, EntityKind, &str); 4] = [
    ("uq_sys_role_code", EntityKind::Role, "code"),
    ("uq_sys_role_name", EntityKind::Role, "name"),
    ("uq_sys_post_code", EntityKind::Post, "code"),
    ("uq_sys_user_username", EntityKind::User, "username"),
];

/// 唯一索引对应的实体与字段
fn unique_index(constraint: &str) -> Option<(EntityKind, &'static str)> {
    UNIQUE_INDEXES
        .iter()
        .find(|(name, ..)| *name == constraint)
        .map(|(_, entity, field)| (*entity, *field))
}

/// 唯一索引冲突（SQLSTATE 23505）映射为 `Conflict`
///
/// 服务层先查重再写入；两个并发写入都通过查重时，由索引兜底。`value_of` 按字段名
/// 取出冲突的值。
fn unique_conflict(err: sqlx::Error, value_of: impl Fn(&str) -> String) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            if let Some((entity, field)) = db_err.constraint().and_then(unique_index) {
                return AppError::conflict(entity, field, value_of(field));
            }
        }
    }
    AppError::Database(err)
}

/// 基于连接池的存储
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn acquire(&self, tenant: &TenantId) -> Result<Box<dyn Session>, AppError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession {
            tenant: tenant.clone(),
            conn: PgConn::Pooled(conn),
        }))
    }

    async fn begin(&self, tenant: &TenantId) -> Result<Box<dyn Session>, AppError> {
        let tx = self.pool.begin().await?;
        tracing::trace!(tenant_id = %tenant, "Transaction started");
        Ok(Box::new(PgSession {
            tenant: tenant.clone(),
            conn: PgConn::Tx(tx),
        }))
    }
}

enum PgConn {
    Pooled(PoolConnection<Postgres>),
    Tx(Transaction<'static, Postgres>),
}

/// 绑定租户的 Postgres 会话
pub struct PgSession {
    tenant: TenantId,
    conn: PgConn,
}

impl PgSession {
    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            PgConn::Pooled(c) => &mut **c,
            PgConn::Tx(tx) => &mut **tx,
        }
    }

    /// 按 ID 批量读取可见行
    async fn fetch_by_ids<T>(
        &mut self,
        table: Table,
        columns: &str,
        ids: &[String],
    ) -> Result<Vec<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = scoped_select(table, columns, &self.tenant);
        qb.push(" AND id = ANY(").push_bind(ids.to_vec()).push(")");

        let rows = qb.build_query_as::<T>().fetch_all(self.conn()).await?;
        Ok(rows)
    }

    /// 按 ID 读取单个可见行
    async fn fetch_one_by_id<T>(
        &mut self,
        table: Table,
        columns: &str,
        id: &str,
    ) -> Result<Option<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut qb = scoped_select(table, columns, &self.tenant);
        qb.push(" AND id = ").push_bind(id.to_string());

        let row = qb.build_query_as::<T>().fetch_optional(self.conn()).await?;
        Ok(row)
    }

    /// 统计可见的子节点
    async fn count_children(&mut self, table: Table, parent_id: &str) -> Result<u64, AppError> {
        let mut qb = scoped_select(table, "COUNT(*)", &self.tenant);
        qb.push(" AND parent_id = ").push_bind(parent_id.to_string());

        let count: i64 = qb.build_query_scalar().fetch_one(self.conn()).await?;
        Ok(count as u64)
    }

    /// 标记软删除
    async fn soft_delete(&mut self, table: Table, id: &str) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "UPDATE {} SET deleted_at = NOW(), updated_at = NOW() WHERE ",
            table.name
        ));
        push_scope(&mut qb, table, &self.tenant);
        qb.push(" AND id = ").push_bind(id.to_string());

        let result = qb.build().execute(self.conn()).await?;
        Ok(result.rows_affected() > 0)
    }

    /// `UPDATE ... WHERE <scope> AND id = $n` 的收尾部分
    fn finish_update(&self, qb: &mut QueryBuilder<'_, Postgres>, table: Table, id: &str) {
        qb.push(", updated_at = NOW() WHERE ");
        push_scope(qb, table, &self.tenant);
        qb.push(" AND id = ").push_bind(id.to_string());
    }
}

#[async_trait]
impl Session for PgSession {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    fn in_transaction(&self) -> bool {
        matches!(self.conn, PgConn::Tx(_))
    }

    async fn existing_ids(
        &mut self,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<HashSet<String>, AppError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut qb = scoped_select(Table::of(kind), "id", &self.tenant);
        qb.push(" AND id = ANY(").push_bind(ids.to_vec()).push(")");

        let found: Vec<String> = qb.build_query_scalar().fetch_all(self.conn()).await?;
        Ok(found.into_iter().collect())
    }

    async fn lock_row(&mut self, kind: EntityKind, id: &str) -> Result<bool, AppError> {
        let mut qb = scoped_select(Table::of(kind), "id", &self.tenant);
        qb.push(" AND id = ")
            .push_bind(id.to_string())
            .push(" FOR UPDATE");

        let found: Option<String> = qb.build_query_scalar().fetch_optional(self.conn()).await?;
        Ok(found.is_some())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let PgSession { tenant, conn } = *self;
        if let PgConn::Tx(tx) = conn {
            tx.commit().await?;
            tracing::trace!(tenant_id = %tenant, "Transaction committed");
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        let PgSession { tenant, conn } = *self;
        if let PgConn::Tx(tx) = conn {
            tx.rollback().await?;
            tracing::debug!(tenant_id = %tenant, "Transaction rolled back");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_index_lookup() {
        assert_eq!(unique_index("uq_sys_role_name"), Some((EntityKind::Role, "name")));
        assert_eq!(
            unique_index("uq_sys_user_username"),
            Some((EntityKind::User, "username"))
        );
        assert_eq!(unique_index("role_menu_pkey"), None);
    }

    #[test]
    fn test_other_errors_stay_database_errors() {
        let err = unique_conflict(sqlx::Error::RowNotFound, |_| String::new());
        assert!(matches!(err, AppError::Database(_)));
    }
}
