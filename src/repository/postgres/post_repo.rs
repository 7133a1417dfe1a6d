//! Post repository (岗位数据访问)

use super::{unique_conflict, PgSession};
use crate::{
    error::AppError,
    models::post::Post,
    repository::{
        scope::{scoped_select, Table},
        PostStore,
    },
};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

const POST_COLUMNS: &str =
    "id, tenant_id, code, name, sort, status, remark, created_at, updated_at, deleted_at";

#[async_trait]
impl PostStore for PgSession {
    async fn find_post(&mut self, id: &str) -> Result<Option<Post>, AppError> {
        self.fetch_one_by_id(Table::POSTS, POST_COLUMNS, id).await
    }

    async fn find_post_by_code(&mut self, code: &str) -> Result<Option<Post>, AppError> {
        let mut qb = scoped_select(Table::POSTS, POST_COLUMNS, &self.tenant);
        qb.push(" AND code = ").push_bind(code.to_string());

        let post = qb.build_query_as::<Post>().fetch_optional(self.conn()).await?;
        Ok(post)
    }

    async fn list_posts(&mut self) -> Result<Vec<Post>, AppError> {
        let mut qb = scoped_select(Table::POSTS, POST_COLUMNS, &self.tenant);
        qb.push(" ORDER BY sort, created_at");

        let posts = qb.build_query_as::<Post>().fetch_all(self.conn()).await?;
        Ok(posts)
    }

    async fn insert_post(&mut self, post: &Post) -> Result<(), AppError> {
        let tenant = self.tenant.as_str().to_string();
        sqlx::query(
            r#"
            INSERT INTO sys_post (id, tenant_id, code, name, sort, status, remark, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&post.id)
        .bind(tenant)
        .bind(&post.code)
        .bind(&post.name)
        .bind(post.sort)
        .bind(post.status)
        .bind(&post.remark)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(self.conn())
        .await
        .map_err(|e| unique_conflict(e, |_| post.code.clone()))?;

        Ok(())
    }

    async fn update_post(&mut self, post: &Post) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE sys_post SET code = ");
        qb.push_bind(post.code.clone())
            .push(", name = ")
            .push_bind(post.name.clone())
            .push(", sort = ")
            .push_bind(post.sort)
            .push(", status = ")
            .push_bind(post.status)
            .push(", remark = ")
            .push_bind(post.remark.clone());
        self.finish_update(&mut qb, Table::POSTS, &post.id);

        let result = qb
            .build()
            .execute(self.conn())
            .await
            .map_err(|e| unique_conflict(e, |_| post.code.clone()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_post(&mut self, id: &str) -> Result<bool, AppError> {
        self.soft_delete(Table::POSTS, id).await
    }
}
