//! Department repository (部门数据访问)

use super::PgSession;
use crate::{
    error::AppError,
    models::dept::Dept,
    repository::{
        scope::{scoped_select, Table},
        DeptStore,
    },
};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

const DEPT_COLUMNS: &str = "id, tenant_id, parent_id, name, sort, leader, phone, email, status, \
     created_at, updated_at, deleted_at";

#[async_trait]
impl DeptStore for PgSession {
    async fn find_dept(&mut self, id: &str) -> Result<Option<Dept>, AppError> {
        self.fetch_one_by_id(Table::DEPTS, DEPT_COLUMNS, id).await
    }

    async fn find_depts(&mut self, ids: &[String]) -> Result<Vec<Dept>, AppError> {
        self.fetch_by_ids(Table::DEPTS, DEPT_COLUMNS, ids).await
    }

    async fn list_depts(&mut self) -> Result<Vec<Dept>, AppError> {
        let mut qb = scoped_select(Table::DEPTS, DEPT_COLUMNS, &self.tenant);
        qb.push(" ORDER BY sort, created_at");

        let depts = qb.build_query_as::<Dept>().fetch_all(self.conn()).await?;
        Ok(depts)
    }

    /// 同级部门重名检查
    async fn find_dept_by_name(
        &mut self,
        parent_id: Option<&str>,
        name: &str,
    ) -> Result<Option<Dept>, AppError> {
        let mut qb = scoped_select(Table::DEPTS, DEPT_COLUMNS, &self.tenant);
        match parent_id {
            Some(p) => {
                qb.push(" AND parent_id = ").push_bind(p.to_string());
            }
            None => {
                qb.push(" AND parent_id IS NULL");
            }
        }
        qb.push(" AND name = ").push_bind(name.to_string());

        let dept = qb.build_query_as::<Dept>().fetch_optional(self.conn()).await?;
        Ok(dept)
    }

    async fn count_child_depts(&mut self, id: &str) -> Result<u64, AppError> {
        self.count_children(Table::DEPTS, id).await
    }

    async fn insert_dept(&mut self, dept: &Dept) -> Result<(), AppError> {
        let tenant = self.tenant.as_str().to_string();
        sqlx::query(
            r#"
            INSERT INTO sys_dept (id, tenant_id, parent_id, name, sort, leader, phone, email, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&dept.id)
        .bind(tenant)
        .bind(&dept.parent_id)
        .bind(&dept.name)
        .bind(dept.sort)
        .bind(&dept.leader)
        .bind(&dept.phone)
        .bind(&dept.email)
        .bind(dept.status)
        .bind(dept.created_at)
        .bind(dept.updated_at)
        .execute(self.conn())
        .await?;

        Ok(())
    }

    async fn update_dept(&mut self, dept: &Dept) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE sys_dept SET parent_id = ");
        qb.push_bind(dept.parent_id.clone())
            .push(", name = ")
            .push_bind(dept.name.clone())
            .push(", sort = ")
            .push_bind(dept.sort)
            .push(", leader = ")
            .push_bind(dept.leader.clone())
            .push(", phone = ")
            .push_bind(dept.phone.clone())
            .push(", email = ")
            .push_bind(dept.email.clone())
            .push(", status = ")
            .push_bind(dept.status);
        self.finish_update(&mut qb, Table::DEPTS, &dept.id);

        let result = qb.build().execute(self.conn()).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_dept(&mut self, id: &str) -> Result<bool, AppError> {
        self.soft_delete(Table::DEPTS, id).await
    }
}
