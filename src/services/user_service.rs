//! 用户管理服务

use super::reconciler::{lock_owner, AssociationReconciler, ReconcileMode, ReconcileOutcome};
use crate::{
    auth::PasswordHasher,
    context::RequestContext,
    error::AppError,
    ids::IdGenerator,
    models::{
        association::EdgeKind,
        user::{CreateUserRequest, UpdateUserRequest, User, UserDetail},
        EntityKind, Status,
    },
    transaction::{Gateway, Scope},
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    gateway: Gateway,
    ids: Arc<dyn IdGenerator>,
    hasher: Arc<PasswordHasher>,
    reconciler: AssociationReconciler,
}

impl UserService {
    pub fn new(gateway: Gateway, ids: Arc<dyn IdGenerator>, hasher: Arc<PasswordHasher>) -> Self {
        Self {
            gateway,
            ids,
            hasher,
            reconciler: AssociationReconciler::new(),
        }
    }

    /// 创建用户，初始角色、岗位、部门在同一事务内绑定
    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreateUserRequest,
    ) -> Result<UserDetail, AppError> {
        req.validate()?;
        self.hasher.validate_policy(&req.password)?;

        let password_hash = self.hasher.hash(&req.password)?;
        let id = self.ids.next_id(EntityKind::User);
        let reconciler = self.reconciler;

        let detail = self
            .gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    if scope.db().find_user_by_username(&req.username).await?.is_some() {
                        return Err(AppError::conflict(EntityKind::User, "username", &req.username));
                    }

                    let now = Utc::now();
                    let user = User {
                        id,
                        tenant_id: scope.ctx().tenant_id.to_string(),
                        username: req.username,
                        password_hash,
                        nickname: req.nickname,
                        email: req.email,
                        phone: req.phone,
                        status: Status::Enabled,
                        password_changed_at: now,
                        created_at: now,
                        updated_at: now,
                        deleted_at: None,
                    };
                    scope.db().insert_user(&user).await?;

                    for (kind, targets) in [
                        (EdgeKind::UserRole, &req.role_ids),
                        (EdgeKind::UserPost, &req.post_ids),
                        (EdgeKind::UserDept, &req.dept_ids),
                    ] {
                        if !targets.is_empty() {
                            reconciler
                                .reconcile(scope, kind, &user.id, targets, ReconcileMode::Replace)
                                .await?;
                        }
                    }

                    load_detail(scope, user).await
                })
            })
            .await?;

        tracing::info!(
            tenant_id = %ctx.tenant_id,
            user_id = %detail.user.id,
            username = %detail.user.username,
            "User created"
        );
        Ok(detail)
    }

    /// 更新用户资料与状态
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        req: UpdateUserRequest,
    ) -> Result<User, AppError> {
        req.validate()?;
        let id = id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let mut user = load_user(scope, &id).await?;

                    if req.nickname.is_some() {
                        user.nickname = req.nickname;
                    }
                    if req.email.is_some() {
                        user.email = req.email;
                    }
                    if req.phone.is_some() {
                        user.phone = req.phone;
                    }
                    if let Some(status) = req.status {
                        user.status = status;
                    }
                    user.updated_at = Utc::now();

                    if !scope.db().update_user(&user).await? {
                        return Err(AppError::not_found(EntityKind::User, &id));
                    }
                    Ok(user)
                })
            })
            .await
    }

    pub async fn change_status(
        &self,
        ctx: &RequestContext,
        id: &str,
        status: Status,
    ) -> Result<User, AppError> {
        let req = UpdateUserRequest {
            status: Some(status),
            ..Default::default()
        };
        self.update(ctx, id, req).await
    }

    /// 修改密码
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        id: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        self.hasher.validate_policy(new_password)?;
        let password_hash = self.hasher.hash(new_password)?;
        self.store_password(ctx, id, password_hash).await?;

        tracing::info!(tenant_id = %ctx.tenant_id, user_id = %id, "Password changed");
        Ok(())
    }

    /// 重置为随机密码并返回明文，由调用方转交给用户
    pub async fn reset_password(&self, ctx: &RequestContext, id: &str) -> Result<String, AppError> {
        let password = self.hasher.generate();
        let password_hash = self.hasher.hash(&password)?;
        self.store_password(ctx, id, password_hash).await?;

        tracing::info!(tenant_id = %ctx.tenant_id, user_id = %id, "Password reset");
        Ok(password)
    }

    async fn store_password(
        &self,
        ctx: &RequestContext,
        id: &str,
        password_hash: String,
    ) -> Result<(), AppError> {
        let id = id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let mut user = load_user(scope, &id).await?;
                    let now = Utc::now();
                    user.password_hash = password_hash;
                    user.password_changed_at = now;
                    user.updated_at = now;
                    scope.db().update_user(&user).await?;
                    Ok(())
                })
            })
            .await
    }

    /// 校验用户名与密码，供登录流程使用
    pub async fn verify_credentials(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let username = username.to_string();
        let user = self
            .gateway
            .run(ctx, move |scope| {
                Box::pin(async move { scope.db().find_user_by_username(&username).await })
            })
            .await?;

        match user {
            Some(user) if user.status.is_enabled() => {
                if self.hasher.verify(password, &user.password_hash)? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    /// 删除用户：软删除并移除全部关联
    pub async fn delete(&self, ctx: &RequestContext, user_id: &str) -> Result<(), AppError> {
        if ctx.user_id == user_id {
            return Err(AppError::precondition(
                EntityKind::User,
                user_id,
                "cannot delete the current user",
            ));
        }
        let id = user_id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    lock_owner(scope, EntityKind::User, &id).await?;
                    for kind in EdgeKind::owned_by(EntityKind::User) {
                        scope.db().delete_all_edges(kind, &id).await?;
                    }
                    scope.db().soft_delete_user(&id).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id, user_id = %user_id, "User deleted");
        Ok(())
    }

    /// 用户详情（含角色、岗位、部门）
    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<UserDetail, AppError> {
        let id = id.to_string();

        self.gateway
            .run(ctx, move |scope| {
                Box::pin(async move {
                    let user = load_user(scope, &id).await?;
                    load_detail(scope, user).await
                })
            })
            .await
    }

    /// 按模式调和用户的一类关联
    pub async fn reconcile(
        &self,
        ctx: &RequestContext,
        id: &str,
        kind: EdgeKind,
        target_ids: Vec<String>,
        mode: ReconcileMode,
    ) -> Result<ReconcileOutcome, AppError> {
        if kind.owner() != EntityKind::User {
            return Err(AppError::validation(format!(
                "{} is not a user association",
                kind
            )));
        }
        let id = id.to_string();
        let reconciler = self.reconciler;

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    reconciler
                        .reconcile(scope, kind, &id, &target_ids, mode)
                        .await
                })
            })
            .await
    }

    pub async fn set_roles(
        &self,
        ctx: &RequestContext,
        id: &str,
        role_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile(ctx, id, EdgeKind::UserRole, role_ids, ReconcileMode::Replace)
            .await
    }

    pub async fn add_roles(
        &self,
        ctx: &RequestContext,
        id: &str,
        role_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile(ctx, id, EdgeKind::UserRole, role_ids, ReconcileMode::Add)
            .await
    }

    pub async fn remove_roles(
        &self,
        ctx: &RequestContext,
        id: &str,
        role_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile(ctx, id, EdgeKind::UserRole, role_ids, ReconcileMode::Remove)
            .await
    }

    pub async fn set_posts(
        &self,
        ctx: &RequestContext,
        id: &str,
        post_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile(ctx, id, EdgeKind::UserPost, post_ids, ReconcileMode::Replace)
            .await
    }

    pub async fn set_depts(
        &self,
        ctx: &RequestContext,
        id: &str,
        dept_ids: Vec<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.reconcile(ctx, id, EdgeKind::UserDept, dept_ids, ReconcileMode::Replace)
            .await
    }
}

async fn load_user(scope: &mut Scope, id: &str) -> Result<User, AppError> {
    scope
        .db()
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::User, id))
}

async fn load_detail(scope: &mut Scope, user: User) -> Result<UserDetail, AppError> {
    let role_ids = scope.db().edge_targets(EdgeKind::UserRole, &user.id).await?;
    let post_ids = scope.db().edge_targets(EdgeKind::UserPost, &user.id).await?;
    let dept_ids = scope.db().edge_targets(EdgeKind::UserDept, &user.id).await?;

    Ok(UserDetail {
        user,
        role_ids,
        post_ids,
        dept_ids,
    })
}
