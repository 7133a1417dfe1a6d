//! 权限解析服务
//!
//! 用户 → 角色 → 菜单 → 权限标识。多个角色的菜单取并集（权限最大的角色生效）。
//! 悬空的边（角色或菜单已删除）被跳过并记录警告，不会导致失败。每次解析都重新
//! 读取当前状态，不做缓存。

use crate::{
    context::RequestContext,
    error::AppError,
    models::{association::EdgeKind, menu::Menu, role::Role, EntityKind},
    transaction::{Gateway, Scope},
    tree::{build_tree, sort_for_tree, Tree},
};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// 用户的有效权限集合
#[derive(Debug, Clone, Default, Serialize)]
pub struct EffectivePermissions {
    /// 角色编码
    pub roles: BTreeSet<String>,
    /// 非空的权限标识
    pub permissions: BTreeSet<String>,
    /// 已授权且启用的菜单树
    pub menus: Vec<Tree<Menu>>,
}

impl EffectivePermissions {
    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.contains(key)
    }

    /// 菜单树中的全部菜单 ID（先序）
    pub fn menu_ids(&self) -> Vec<String> {
        self.menus
            .iter()
            .flat_map(|t| t.iter())
            .map(|m| m.id.clone())
            .collect()
    }
}

#[derive(Clone)]
pub struct PermissionService {
    gateway: Gateway,
}

impl PermissionService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// 解析用户的有效权限
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> Result<EffectivePermissions, AppError> {
        let user_id = user_id.to_string();
        self.gateway
            .run(ctx, move |scope| {
                Box::pin(async move { resolve_in(scope, &user_id).await })
            })
            .await
    }

    /// 检查用户是否拥有权限
    pub async fn check_permission(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        permission: &str,
    ) -> Result<bool, AppError> {
        let effective = self.resolve(ctx, user_id).await?;
        Ok(effective.has_permission(permission))
    }

    /// 检查权限，如果无权限则返回错误
    pub async fn require_permission(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        permission: &str,
    ) -> Result<(), AppError> {
        if !self.check_permission(ctx, user_id, permission).await? {
            tracing::warn!(
                tenant_id = %ctx.tenant_id,
                user_id = %user_id,
                permission = %permission,
                "Permission denied"
            );
            return Err(AppError::Forbidden);
        }

        Ok(())
    }
}

/// 在给定作用域内解析
pub(crate) async fn resolve_in(
    scope: &mut Scope,
    user_id: &str,
) -> Result<EffectivePermissions, AppError> {
    let user = scope
        .db()
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::User, user_id))?;

    if !user.status.is_enabled() {
        tracing::debug!(user_id = %user_id, "Disabled user resolves to no permissions");
        return Ok(EffectivePermissions::default());
    }

    let roles = enabled_roles(scope, user_id).await?;
    if roles.is_empty() {
        return Ok(EffectivePermissions::default());
    }

    // 菜单取并集，保持首次出现的顺序
    let mut seen = HashSet::new();
    let mut menu_ids = Vec::new();
    for role in &roles {
        for menu_id in scope.db().edge_targets(EdgeKind::RoleMenu, &role.id).await? {
            if seen.insert(menu_id.clone()) {
                menu_ids.push(menu_id);
            }
        }
    }

    let found = scope.db().find_menus(&menu_ids).await?;
    report_dangling(
        EdgeKind::RoleMenu,
        user_id,
        &menu_ids,
        found.iter().map(|m| m.id.as_str()),
    );

    let mut menus: Vec<Menu> = found
        .into_iter()
        .filter(|m| m.status.is_enabled())
        .collect();
    sort_for_tree(&mut menus);

    let permissions = menus
        .iter()
        .filter_map(Menu::permission)
        .map(str::to_string)
        .collect();

    Ok(EffectivePermissions {
        roles: roles.into_iter().map(|r| r.code).collect(),
        permissions,
        menus: build_tree(menus),
    })
}

/// 用户的启用角色；悬空的 UserRole 边被跳过
pub(crate) async fn enabled_roles(scope: &mut Scope, user_id: &str) -> Result<Vec<Role>, AppError> {
    let role_ids = scope.db().edge_targets(EdgeKind::UserRole, user_id).await?;
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let found = scope.db().find_roles(&role_ids).await?;
    report_dangling(
        EdgeKind::UserRole,
        user_id,
        &role_ids,
        found.iter().map(|r| r.id.as_str()),
    );

    Ok(found.into_iter().filter(|r| r.status.is_enabled()).collect())
}

/// 记录引用了不可见目标的边
pub(crate) fn report_dangling<'a>(
    kind: EdgeKind,
    user_id: &str,
    referenced: &[String],
    found: impl Iterator<Item = &'a str>,
) {
    let found: HashSet<&str> = found.collect();
    for id in referenced.iter().filter(|id| !found.contains(id.as_str())) {
        metrics::counter!("authz.resolve.dangling_edges", "kind" => kind.as_str()).increment(1);
        tracing::warn!(
            user_id = %user_id,
            kind = %kind,
            target_id = %id,
            "Skipping dangling edge"
        );
    }
}
