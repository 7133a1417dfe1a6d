//! Role repository (角色数据访问)

use super::{unique_conflict, PgSession};
use crate::{
    error::AppError,
    models::role::Role,
    repository::{
        scope::{scoped_select, Table},
        RoleStore,
    },
};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

const ROLE_COLUMNS: &str =
    "id, tenant_id, name, code, sort, status, data_scope, remark, created_at, updated_at, deleted_at";

#[async_trait]
impl RoleStore for PgSession {
    /// 根据 ID 查找角色
    async fn find_role(&mut self, id: &str) -> Result<Option<Role>, AppError> {
        self.fetch_one_by_id(Table::ROLES, ROLE_COLUMNS, id).await
    }

    async fn find_roles(&mut self, ids: &[String]) -> Result<Vec<Role>, AppError> {
        self.fetch_by_ids(Table::ROLES, ROLE_COLUMNS, ids).await
    }

    /// 根据编码查找角色
    async fn find_role_by_code(&mut self, code: &str) -> Result<Option<Role>, AppError> {
        let mut qb = scoped_select(Table::ROLES, ROLE_COLUMNS, &self.tenant);
        qb.push(" AND code = ").push_bind(code.to_string());

        let role = qb.build_query_as::<Role>().fetch_optional(self.conn()).await?;
        Ok(role)
    }

    /// 根据名称查找角色
    async fn find_role_by_name(&mut self, name: &str) -> Result<Option<Role>, AppError> {
        let mut qb = scoped_select(Table::ROLES, ROLE_COLUMNS, &self.tenant);
        qb.push(" AND name = ").push_bind(name.to_string());

        let role = qb.build_query_as::<Role>().fetch_optional(self.conn()).await?;
        Ok(role)
    }

    /// 列出所有角色
    async fn list_roles(&mut self) -> Result<Vec<Role>, AppError> {
        let mut qb = scoped_select(Table::ROLES, ROLE_COLUMNS, &self.tenant);
        qb.push(" ORDER BY sort, created_at");

        let roles = qb.build_query_as::<Role>().fetch_all(self.conn()).await?;
        Ok(roles)
    }

    /// 创建角色
    async fn insert_role(&mut self, role: &Role) -> Result<(), AppError> {
        let tenant = self.tenant.as_str().to_string();
        sqlx::query(
            r#"
            INSERT INTO sys_role (id, tenant_id, name, code, sort, status, data_scope, remark, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&role.id)
        .bind(tenant)
        .bind(&role.name)
        .bind(&role.code)
        .bind(role.sort)
        .bind(role.status)
        .bind(role.data_scope)
        .bind(&role.remark)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(self.conn())
        .await
        .map_err(|e| unique_conflict(e, |field| role_field(role, field)))?;

        Ok(())
    }

    /// 更新角色
    async fn update_role(&mut self, role: &Role) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE sys_role SET name = ");
        qb.push_bind(role.name.clone())
            .push(", code = ")
            .push_bind(role.code.clone())
            .push(", sort = ")
            .push_bind(role.sort)
            .push(", status = ")
            .push_bind(role.status)
            .push(", data_scope = ")
            .push_bind(role.data_scope)
            .push(", remark = ")
            .push_bind(role.remark.clone());
        self.finish_update(&mut qb, Table::ROLES, &role.id);

        let result = qb
            .build()
            .execute(self.conn())
            .await
            .map_err(|e| unique_conflict(e, |field| role_field(role, field)))?;
        Ok(result.rows_affected() > 0)
    }

    /// 删除角色（软删除）
    async fn soft_delete_role(&mut self, id: &str) -> Result<bool, AppError> {
        self.soft_delete(Table::ROLES, id).await
    }
}

fn role_field(role: &Role, field: &str) -> String {
    match field {
        "name" => role.name.clone(),
        _ => role.code.clone(),
    }
}
