//! User repository (用户数据访问)

use super::{unique_conflict, PgSession};
use crate::{
    error::AppError,
    models::user::User,
    repository::{
        scope::{scoped_select, Table},
        UserStore,
    },
};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

const USER_COLUMNS: &str = "id, tenant_id, username, password_hash, nickname, email, phone, status, \
     password_changed_at, created_at, updated_at, deleted_at";

#[async_trait]
impl UserStore for PgSession {
    /// 根据 ID 查找用户
    async fn find_user(&mut self, id: &str) -> Result<Option<User>, AppError> {
        self.fetch_one_by_id(Table::USERS, USER_COLUMNS, id).await
    }

    /// 根据用户名查找用户
    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>, AppError> {
        let mut qb = scoped_select(Table::USERS, USER_COLUMNS, &self.tenant);
        qb.push(" AND username = ").push_bind(username.to_string());

        let user = qb.build_query_as::<User>().fetch_optional(self.conn()).await?;
        Ok(user)
    }

    async fn find_users(&mut self, ids: &[String]) -> Result<Vec<User>, AppError> {
        self.fetch_by_ids(Table::USERS, USER_COLUMNS, ids).await
    }

    /// 创建用户
    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        let tenant = self.tenant.as_str().to_string();
        sqlx::query(
            r#"
            INSERT INTO sys_user (
                id, tenant_id, username, password_hash, nickname, email, phone, status,
                password_changed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&user.id)
        .bind(tenant)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.status)
        .bind(user.password_changed_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.conn())
        .await
        .map_err(|e| unique_conflict(e, |_| user.username.clone()))?;

        Ok(())
    }

    /// 更新用户（含密码哈希）
    async fn update_user(&mut self, user: &User) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE sys_user SET nickname = ");
        qb.push_bind(user.nickname.clone())
            .push(", email = ")
            .push_bind(user.email.clone())
            .push(", phone = ")
            .push_bind(user.phone.clone())
            .push(", status = ")
            .push_bind(user.status)
            .push(", password_hash = ")
            .push_bind(user.password_hash.clone())
            .push(", password_changed_at = ")
            .push_bind(user.password_changed_at);
        self.finish_update(&mut qb, Table::USERS, &user.id);

        let result = qb.build().execute(self.conn()).await?;
        Ok(result.rows_affected() > 0)
    }

    /// 删除用户（软删除）
    async fn soft_delete_user(&mut self, id: &str) -> Result<bool, AppError> {
        self.soft_delete(Table::USERS, id).await
    }
}
