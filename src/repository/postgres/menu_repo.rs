//! Menu repository (菜单数据访问，菜单为全局目录)

use super::PgSession;
use crate::{
    error::AppError,
    models::menu::Menu,
    repository::{
        scope::{scoped_select, Table},
        MenuStore,
    },
};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

const MENU_COLUMNS: &str = "id, parent_id, name, permission_key, menu_type, path, component, icon, \
     sort, status, visible, keep_alive, always_show, created_at, updated_at, deleted_at";

#[async_trait]
impl MenuStore for PgSession {
    async fn find_menu(&mut self, id: &str) -> Result<Option<Menu>, AppError> {
        self.fetch_one_by_id(Table::MENUS, MENU_COLUMNS, id).await
    }

    async fn find_menus(&mut self, ids: &[String]) -> Result<Vec<Menu>, AppError> {
        self.fetch_by_ids(Table::MENUS, MENU_COLUMNS, ids).await
    }

    /// 列出所有菜单（按排序字段、创建时间）
    async fn list_menus(&mut self) -> Result<Vec<Menu>, AppError> {
        let mut qb = scoped_select(Table::MENUS, MENU_COLUMNS, &self.tenant);
        qb.push(" ORDER BY sort, created_at");

        let menus = qb.build_query_as::<Menu>().fetch_all(self.conn()).await?;
        Ok(menus)
    }

    async fn count_child_menus(&mut self, id: &str) -> Result<u64, AppError> {
        self.count_children(Table::MENUS, id).await
    }

    /// 创建菜单
    async fn insert_menu(&mut self, menu: &Menu) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sys_menu (
                id, parent_id, name, permission_key, menu_type, path, component, icon,
                sort, status, visible, keep_alive, always_show, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&menu.id)
        .bind(&menu.parent_id)
        .bind(&menu.name)
        .bind(&menu.permission_key)
        .bind(menu.menu_type)
        .bind(&menu.path)
        .bind(&menu.component)
        .bind(&menu.icon)
        .bind(menu.sort)
        .bind(menu.status)
        .bind(menu.visible)
        .bind(menu.keep_alive)
        .bind(menu.always_show)
        .bind(menu.created_at)
        .bind(menu.updated_at)
        .execute(self.conn())
        .await?;

        Ok(())
    }

    /// 更新菜单
    async fn update_menu(&mut self, menu: &Menu) -> Result<bool, AppError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE sys_menu SET parent_id = ");
        qb.push_bind(menu.parent_id.clone())
            .push(", name = ")
            .push_bind(menu.name.clone())
            .push(", permission_key = ")
            .push_bind(menu.permission_key.clone())
            .push(", menu_type = ")
            .push_bind(menu.menu_type)
            .push(", path = ")
            .push_bind(menu.path.clone())
            .push(", component = ")
            .push_bind(menu.component.clone())
            .push(", icon = ")
            .push_bind(menu.icon.clone())
            .push(", sort = ")
            .push_bind(menu.sort)
            .push(", status = ")
            .push_bind(menu.status)
            .push(", visible = ")
            .push_bind(menu.visible)
            .push(", keep_alive = ")
            .push_bind(menu.keep_alive)
            .push(", always_show = ")
            .push_bind(menu.always_show);
        self.finish_update(&mut qb, Table::MENUS, &menu.id);

        let result = qb.build().execute(self.conn()).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_menu(&mut self, id: &str) -> Result<bool, AppError> {
        self.soft_delete(Table::MENUS, id).await
    }

    async fn unbind_menu(&mut self, id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM role_menu WHERE menu_id = $1")
            .bind(id)
            .execute(self.conn())
            .await?;

        Ok(result.rows_affected())
    }
}
