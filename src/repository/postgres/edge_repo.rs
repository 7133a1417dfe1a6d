//! Association edge repository (关联关系数据访问)

use super::PgSession;
use crate::{
    error::AppError,
    models::association::EdgeKind,
    repository::{
        scope::{push_scope, scoped_select, Table},
        EdgeStore,
    },
};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

impl PgSession {
    /// `DELETE FROM {edge} WHERE <scope>`，调用方继续追加条件
    fn delete_edges_query(&self, kind: EdgeKind) -> QueryBuilder<'static, Postgres> {
        let table = Table::edges(kind);
        let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE ", table.name));
        push_scope(&mut qb, table, &self.tenant);
        qb
    }
}

#[async_trait]
impl EdgeStore for PgSession {
    async fn edge_targets(
        &mut self,
        kind: EdgeKind,
        owner_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let mut qb = scoped_select(Table::edges(kind), kind.target_column(), &self.tenant);
        qb.push(format!(" AND {} = ", kind.owner_column()))
            .push_bind(owner_id.to_string())
            .push(format!(" ORDER BY created_at, {}", kind.target_column()));

        let ids: Vec<String> = qb.build_query_scalar().fetch_all(self.conn()).await?;
        Ok(ids)
    }

    async fn edge_owners(
        &mut self,
        kind: EdgeKind,
        target_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let mut qb = scoped_select(Table::edges(kind), kind.owner_column(), &self.tenant);
        qb.push(format!(" AND {} = ", kind.target_column()))
            .push_bind(target_id.to_string())
            .push(format!(" ORDER BY created_at, {}", kind.owner_column()));

        let ids: Vec<String> = qb.build_query_scalar().fetch_all(self.conn()).await?;
        Ok(ids)
    }

    /// 批量插入关联，已存在的对被跳过
    async fn insert_edges(
        &mut self,
        kind: EdgeKind,
        owner_id: &str,
        target_ids: &[String],
    ) -> Result<u64, AppError> {
        if target_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT INTO {} ({}, {}, tenant_id, created_at) \
             SELECT $1, t, $2, NOW() FROM UNNEST($3::text[]) AS t \
             ON CONFLICT DO NOTHING",
            kind.table(),
            kind.owner_column(),
            kind.target_column()
        );
        let tenant = self.tenant.as_str().to_string();

        let result = sqlx::query(&sql)
            .bind(owner_id)
            .bind(tenant)
            .bind(target_ids.to_vec())
            .execute(self.conn())
            .await?;

        Ok(result.rows_affected())
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

        let mut qb = self.delete_edges_query(kind);
        qb.push(format!(" AND {} = ", kind.owner_column()))
            .push_bind(owner_id.to_string())
            .push(format!(" AND {} = ANY(", kind.target_column()))
            .push_bind(target_ids.to_vec())
            .push(")");

        let result = qb.build().execute(self.conn()).await?;
        Ok(result.rows_affected())
    }

    async fn delete_all_edges(&mut self, kind: EdgeKind, owner_id: &str) -> Result<u64, AppError> {
        let mut qb = self.delete_edges_query(kind);
        qb.push(format!(" AND {} = ", kind.owner_column()))
            .push_bind(owner_id.to_string());

        let result = qb.build().execute(self.conn()).await?;
        Ok(result.rows_affected())
    }

    async fn delete_edges_by_target(
        &mut self,
        kind: EdgeKind,
        target_id: &str,
    ) -> Result<u64, AppError> {
        let mut qb = self.delete_edges_query(kind);
        qb.push(format!(" AND {} = ", kind.target_column()))
            .push_bind(target_id.to_string());

        let result = qb.build().execute(self.conn()).await?;
        Ok(result.rows_affected())
    }
}
