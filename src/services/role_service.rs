//! 角色管理服务

use super::reconciler::{lock_owner, AssociationReconciler, ReconcileMode, ReconcileOutcome};
use crate::{
    context::RequestContext,
    error::AppError,
    ids::IdGenerator,
    models::{
        association::EdgeKind,
        role::{CreateRoleRequest, DataScope, DataScopeRequest, Role, RoleDetail, UpdateRoleRequest},
        user::User,
        EntityKind, Status,
    },
    transaction::{Gateway, Scope},
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct RoleService {
    gateway: Gateway,
    ids: Arc<dyn IdGenerator>,
    reconciler: AssociationReconciler,
}

impl RoleService {
    pub fn new(gateway: Gateway, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            gateway,
            ids,
            reconciler: AssociationReconciler::new(),
        }
    }

    /// 创建角色，可同时绑定初始菜单
    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreateRoleRequest,
    ) -> Result<Role, AppError> {
        req.validate()?;

        let id = self.ids.next_id(EntityKind::Role);
        let reconciler = self.reconciler;

        let role = self
            .gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    ensure_unique(scope, None, &req.code, &req.name).await?;

                    let now = Utc::now();
                    let role = Role {
                        id,
                        tenant_id: scope.ctx().tenant_id.to_string(),
                        name: req.name,
                        code: req.code,
                        sort: req.sort,
                        status: Status::Enabled,
                        data_scope: req.data_scope,
                        remark: req.remark,
                        created_at: now,
                        updated_at: now,
                        deleted_at: None,
                    };
                    scope.db().insert_role(&role).await?;

                    if !req.menu_ids.is_empty() {
                        reconciler
                            .reconcile(
                                scope,
                                EdgeKind::RoleMenu,
                                &role.id,
                                &req.menu_ids,
                                ReconcileMode::Replace,
                            )
                            .await?;
                    }

                    Ok(role)
                })
            })
            .await?;

        tracing::info!(
            tenant_id = %ctx.tenant_id,
            role_id = %role.id,
            code = %role.code,
            "Role created"
        );
        Ok(role)
    }

    /// 更新角色
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        req: UpdateRoleRequest,
    ) -> Result<Role, AppError> {
        req.validate()?;
        let id = id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let mut role = load_role(scope, &id).await?;

                    let code = req.code.unwrap_or_else(|| role.code.clone());
                    let name = req.name.unwrap_or_else(|| role.name.clone());
                    ensure_unique(scope, Some(role.id.as_str()), &code, &name).await?;

                    role.code = code;
                    role.name = name;
                    if let Some(sort) = req.sort {
                        role.sort = sort;
                    }
                    if let Some(status) = req.status {
                        role.status = status;
                    }
                    if req.remark.is_some() {
                        role.remark = req.remark;
                    }
                    role.updated_at = Utc::now();

                    if !scope.db().update_role(&role).await? {
                        return Err(AppError::not_found(EntityKind::Role, &role.id));
                    }
                    Ok(role)
                })
            })
            .await
    }

    /// 启用/停用角色
    pub async fn change_status(
        &self,
        ctx: &RequestContext,
        id: &str,
        status: Status,
    ) -> Result<Role, AppError> {
        let req = UpdateRoleRequest {
            status: Some(status),
            ..Default::default()
        };
        self.update(ctx, id, req).await
    }

    /// 删除角色。仍有用户绑定时拒绝；同时清除菜单与部门绑定
    pub async fn delete(&self, ctx: &RequestContext, role_id: &str) -> Result<(), AppError> {
        let id = role_id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    lock_owner(scope, EntityKind::Role, &id).await?;

                    let users = scope.db().edge_owners(EdgeKind::UserRole, &id).await?;
                    if !users.is_empty() {
                        return Err(AppError::precondition(
                            EntityKind::Role,
                            &id,
                            format!("assigned to {} user(s)", users.len()),
                        ));
                    }

                    for kind in EdgeKind::owned_by(EntityKind::Role) {
                        scope.db().delete_all_edges(kind, &id).await?;
                    }
                    scope.db().soft_delete_role(&id).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id, role_id = %role_id, "Role deleted");
        Ok(())
    }

    /// 角色详情（含菜单与自定义部门）
    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<RoleDetail, AppError> {
        let id = id.to_string();

        self.gateway
            .run(ctx, move |scope| {
                Box::pin(async move {
                    let role = load_role(scope, &id).await?;
                    let menu_ids = scope.db().edge_targets(EdgeKind::RoleMenu, &id).await?;
                    let dept_ids = match role.data_scope {
                        DataScope::Custom => scope.db().edge_targets(EdgeKind::RoleDept, &id).await?,
                        _ => Vec::new(),
                    };

                    Ok(RoleDetail {
                        role,
                        menu_ids,
                        dept_ids,
                    })
                })
            })
            .await
    }

    /// 列出所有角色
    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<Role>, AppError> {
        self.gateway
            .run(ctx, |scope| Box::pin(async move { scope.db().list_roles().await }))
            .await
    }

    /// 按模式调和角色的菜单
    pub async fn reconcile_menus(
        &self,
        ctx: &RequestContext,
        id: &str,
        menu_ids: Vec<String>,
        mode: ReconcileMode,
    ) -> Result<ReconcileOutcome, AppError> {
        let id = id.to_string();
        let reconciler = self.reconciler;

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    reconciler
                        .reconcile(scope, EdgeKind::RoleMenu, &id, &menu_ids, mode)
                        .await
                })
            })
            .await
    }

    /// 按模式调和自定义数据权限的部门；只有 `custom` 范围的角色持有部门列表
    pub async fn reconcile_depts(
        &self,
        ctx: &RequestContext,
        id: &str,
        dept_ids: Vec<String>,
        mode: ReconcileMode,
    ) -> Result<ReconcileOutcome, AppError> {
        let id = id.to_string();
        let reconciler = self.reconciler;

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    lock_owner(scope, EntityKind::Role, &id).await?;
                    let role = load_role(scope, &id).await?;
                    if role.data_scope != DataScope::Custom {
                        return Err(AppError::validation(format!(
                            "role {} uses data scope {}, departments apply only to custom",
                            id,
                            role.data_scope.as_str()
                        )));
                    }

                    reconciler
                        .reconcile(scope, EdgeKind::RoleDept, &id, &dept_ids, mode)
                        .await
                })
            })
            .await
    }

    /// 分配菜单（替换）
    pub async fn assign_menus(
        &self,
        ctx: &RequestContext,
        id: &str,
        menu_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile_menus(ctx, id, menu_ids, ReconcileMode::Replace)
            .await
    }

    /// 授予菜单（追加）
    pub async fn grant_menus(
        &self,
        ctx: &RequestContext,
        id: &str,
        menu_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile_menus(ctx, id, menu_ids, ReconcileMode::Add).await
    }

    /// 撤销菜单
    pub async fn revoke_menus(
        &self,
        ctx: &RequestContext,
        id: &str,
        menu_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile_menus(ctx, id, menu_ids, ReconcileMode::Remove)
            .await
    }

    /// 设置数据权限。`custom` 时替换部门列表，其他范围清空部门列表
    pub async fn set_data_scope(
        &self,
        ctx: &RequestContext,
        id: &str,
        req: DataScopeRequest,
    ) -> Result<RoleDetail, AppError> {
        let id = id.to_string();
        let reconciler = self.reconciler;

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let mut role = load_role(scope, &id).await?;
                    role.data_scope = req.data_scope;
                    role.updated_at = Utc::now();
                    scope.db().update_role(&role).await?;

                    let dept_ids = if req.data_scope == DataScope::Custom {
                        reconciler
                            .reconcile(
                                scope,
                                EdgeKind::RoleDept,
                                &id,
                                &req.dept_ids,
                                ReconcileMode::Replace,
                            )
                            .await?;
                        scope.db().edge_targets(EdgeKind::RoleDept, &id).await?
                    } else {
                        scope.db().delete_all_edges(EdgeKind::RoleDept, &id).await?;
                        Vec::new()
                    };
                    let menu_ids = scope.db().edge_targets(EdgeKind::RoleMenu, &id).await?;

                    Ok(RoleDetail {
                        role,
                        menu_ids,
                        dept_ids,
                    })
                })
            })
            .await
    }

    /// 绑定了该角色的用户
    pub async fn list_users(&self, ctx: &RequestContext, id: &str) -> Result<Vec<User>, AppError> {
        let id = id.to_string();

        self.gateway
            .run(ctx, move |scope| {
                Box::pin(async move {
                    load_role(scope, &id).await?;
                    let user_ids = scope.db().edge_owners(EdgeKind::UserRole, &id).await?;
                    scope.db().find_users(&user_ids).await
                })
            })
            .await
    }
}

async fn load_role(scope: &mut Scope, id: &str) -> Result<Role, AppError> {
    scope
        .db()
        .find_role(id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Role, id))
}

/// 编码与名称在租户内唯一
async fn ensure_unique(
    scope: &mut Scope,
    current_id: Option<&str>,
    code: &str,
    name: &str,
) -> Result<(), AppError> {
    if let Some(existing) = scope.db().find_role_by_code(code).await? {
        if Some(existing.id.as_str()) != current_id {
            return Err(AppError::conflict(EntityKind::Role, "code", code));
        }
    }

    if let Some(existing) = scope.db().find_role_by_name(name).await? {
        if Some(existing.id.as_str()) != current_id {
            return Err(AppError::conflict(EntityKind::Role, "name", name));
        }
    }

    Ok(())
}
