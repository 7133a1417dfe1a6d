//! 菜单管理服务
//!
//! 菜单是所有租户共享的目录，只有平台租户可以增删改；角色与菜单的绑定按租户隔离。

use super::hierarchy::ensure_acyclic_parent;
use crate::{
    context::{RequestContext, TenantId},
    error::AppError,
    ids::IdGenerator,
    models::{
        association::EdgeKind,
        menu::{CreateMenuRequest, Menu, UpdateMenuRequest},
        EntityKind, Status,
    },
    transaction::{Gateway, Scope},
    tree::{build_tree, normalize_parent, sort_for_tree, Tree},
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct MenuService {
    gateway: Gateway,
    ids: Arc<dyn IdGenerator>,
    platform: TenantId,
}

impl MenuService {
    pub fn new(gateway: Gateway, ids: Arc<dyn IdGenerator>, platform: TenantId) -> Self {
        Self {
            gateway,
            ids,
            platform,
        }
    }

    /// 修改全局目录会影响所有租户的权限，只允许平台租户
    fn ensure_platform(&self, ctx: &RequestContext) -> Result<(), AppError> {
        if ctx.is_platform(&self.platform) {
            return Ok(());
        }

        tracing::warn!(
            tenant_id = %ctx.tenant_id,
            user_id = %ctx.user_id,
            "Menu mutation rejected outside platform tenant"
        );
        Err(AppError::Forbidden)
    }

    /// 创建菜单，父菜单必须存在
    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreateMenuRequest,
    ) -> Result<Menu, AppError> {
        self.ensure_platform(ctx)?;
        req.validate()?;
        let id = self.ids.next_id(EntityKind::Menu);

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let parent_id = normalize_parent(req.parent_id);
                    if let Some(parent) = parent_id.as_deref() {
                        if scope.db().find_menu(parent).await?.is_none() {
                            return Err(AppError::InvalidParent {
                                entity: EntityKind::Menu,
                                id: id.clone(),
                                parent_id: parent.to_string(),
                            });
                        }
                    }

                    let now = Utc::now();
                    let menu = Menu {
                        id,
                        parent_id,
                        name: req.name,
                        permission_key: req.permission_key.filter(|k| !k.trim().is_empty()),
                        menu_type: req.menu_type,
                        path: req.path,
                        component: req.component,
                        icon: req.icon,
                        sort: req.sort,
                        status: Status::Enabled,
                        visible: req.visible,
                        keep_alive: req.keep_alive,
                        always_show: req.always_show,
                        created_at: now,
                        updated_at: now,
                        deleted_at: None,
                    };
                    scope.db().insert_menu(&menu).await?;
                    Ok(menu)
                })
            })
            .await
    }

    /// 更新菜单；修改父节点时校验不会形成环
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        req: UpdateMenuRequest,
    ) -> Result<Menu, AppError> {
        self.ensure_platform(ctx)?;
        req.validate()?;
        let id = id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let mut menu = load_menu(scope, &id).await?;

                    if let Some(parent) = req.parent_id {
                        let parent = normalize_parent(Some(parent));
                        if parent != menu.parent_id {
                            let all = scope.db().list_menus().await?;
                            ensure_acyclic_parent(EntityKind::Menu, &id, parent.as_deref(), &all)?;
                            menu.parent_id = parent;
                        }
                    }

                    if let Some(name) = req.name {
                        menu.name = name;
                    }
                    if let Some(key) = req.permission_key {
                        menu.permission_key = Some(key).filter(|k| !k.trim().is_empty());
                    }
                    if let Some(menu_type) = req.menu_type {
                        menu.menu_type = menu_type;
                    }
                    if req.path.is_some() {
                        menu.path = req.path;
                    }
                    if req.component.is_some() {
                        menu.component = req.component;
                    }
                    if req.icon.is_some() {
                        menu.icon = req.icon;
                    }
                    if let Some(sort) = req.sort {
                        menu.sort = sort;
                    }
                    if let Some(status) = req.status {
                        menu.status = status;
                    }
                    if let Some(visible) = req.visible {
                        menu.visible = visible;
                    }
                    if let Some(keep_alive) = req.keep_alive {
                        menu.keep_alive = keep_alive;
                    }
                    if let Some(always_show) = req.always_show {
                        menu.always_show = always_show;
                    }
                    menu.updated_at = Utc::now();

                    if !scope.db().update_menu(&menu).await? {
                        return Err(AppError::not_found(EntityKind::Menu, &id));
                    }
                    Ok(menu)
                })
            })
            .await
    }

    /// 删除菜单。存在子菜单时拒绝；移除所有租户中指向它的角色绑定
    pub async fn delete(&self, ctx: &RequestContext, menu_id: &str) -> Result<(), AppError> {
        self.ensure_platform(ctx)?;
        let id = menu_id.to_string();

        let unbound = self
            .gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    load_menu(scope, &id).await?;

                    let children = scope.db().count_child_menus(&id).await?;
                    if children > 0 {
                        return Err(AppError::precondition(
                            EntityKind::Menu,
                            &id,
                            format!("has {} child menu(s)", children),
                        ));
                    }

                    let unbound = scope.db().unbind_menu(&id).await?;
                    scope.db().soft_delete_menu(&id).await?;
                    Ok(unbound)
                })
            })
            .await?;

        tracing::info!(
            tenant_id = %ctx.tenant_id,
            menu_id = %menu_id,
            unbound_roles = unbound,
            "Menu deleted"
        );
        Ok(())
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Menu, AppError> {
        let id = id.to_string();
        self.gateway
            .run(ctx, move |scope| Box::pin(async move { load_menu(scope, &id).await }))
            .await
    }

    /// 完整菜单树（按排序字段、创建时间）
    pub async fn tree(&self, ctx: &RequestContext) -> Result<Vec<Tree<Menu>>, AppError> {
        self.gateway
            .run(ctx, |scope| {
                Box::pin(async move {
                    let mut menus = scope.db().list_menus().await?;
                    sort_for_tree(&mut menus);
                    Ok(build_tree(menus))
                })
            })
            .await
    }

    /// 角色已绑定的菜单树
    pub async fn role_menu_tree(
        &self,
        ctx: &RequestContext,
        role_id: &str,
    ) -> Result<Vec<Tree<Menu>>, AppError> {
        let role_id = role_id.to_string();

        self.gateway
            .run(ctx, move |scope| {
                Box::pin(async move {
                    if scope.db().find_role(&role_id).await?.is_none() {
                        return Err(AppError::not_found(EntityKind::Role, &role_id));
                    }

                    let menu_ids = scope.db().edge_targets(EdgeKind::RoleMenu, &role_id).await?;
                    let mut menus = scope.db().find_menus(&menu_ids).await?;
                    sort_for_tree(&mut menus);
                    Ok(build_tree(menus))
                })
            })
            .await
    }
}

async fn load_menu(scope: &mut Scope, id: &str) -> Result<Menu, AppError> {
    scope
        .db()
        .find_menu(id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Menu, id))
}
