//! 岗位管理服务

use crate::{
    context::RequestContext,
    error::AppError,
    ids::IdGenerator,
    models::{
        association::EdgeKind,
        post::{CreatePostRequest, Post, UpdatePostRequest},
        EntityKind, Status,
    },
    transaction::{Gateway, Scope},
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct PostService {
    gateway: Gateway,
    ids: Arc<dyn IdGenerator>,
}

impl PostService {
    pub fn new(gateway: Gateway, ids: Arc<dyn IdGenerator>) -> Self {
        Self { gateway, ids }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreatePostRequest,
    ) -> Result<Post, AppError> {
        req.validate()?;
        let id = self.ids.next_id(EntityKind::Post);

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    ensure_unique_code(scope, None, &req.code).await?;

                    let now = Utc::now();
                    let post = Post {
                        id,
                        tenant_id: scope.ctx().tenant_id.to_string(),
                        code: req.code,
                        name: req.name,
                        sort: req.sort,
                        status: Status::Enabled,
                        remark: req.remark,
                        created_at: now,
                        updated_at: now,
                        deleted_at: None,
                    };
                    scope.db().insert_post(&post).await?;
                    Ok(post)
                })
            })
            .await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        req: UpdatePostRequest,
    ) -> Result<Post, AppError> {
        req.validate()?;
        let id = id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let mut post = load_post(scope, &id).await?;

                    if let Some(code) = req.code {
                        ensure_unique_code(scope, Some(id.as_str()), &code).await?;
                        post.code = code;
                    }
                    if let Some(name) = req.name {
                        post.name = name;
                    }
                    if let Some(sort) = req.sort {
                        post.sort = sort;
                    }
                    if let Some(status) = req.status {
                        post.status = status;
                    }
                    if req.remark.is_some() {
                        post.remark = req.remark;
                    }
                    post.updated_at = Utc::now();

                    if !scope.db().update_post(&post).await? {
                        return Err(AppError::not_found(EntityKind::Post, &id));
                    }
                    Ok(post)
                })
            })
            .await
    }

    /// 删除岗位，仍有用户任职时拒绝
    pub async fn delete(&self, ctx: &RequestContext, post_id: &str) -> Result<(), AppError> {
        let id = post_id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    load_post(scope, &id).await?;

                    let users = scope.db().edge_owners(EdgeKind::UserPost, &id).await?;
                    if !users.is_empty() {
                        return Err(AppError::precondition(
                            EntityKind::Post,
                            &id,
                            format!("held by {} user(s)", users.len()),
                        ));
                    }

                    scope.db().soft_delete_post(&id).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id, post_id = %post_id, "Post deleted");
        Ok(())
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Post, AppError> {
        let id = id.to_string();
        self.gateway
            .run(ctx, move |scope| Box::pin(async move { load_post(scope, &id).await }))
            .await
    }

    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<Post>, AppError> {
        self.gateway
            .run(ctx, |scope| Box::pin(async move { scope.db().list_posts().await }))
            .await
    }
}

async fn load_post(scope: &mut Scope, id: &str) -> Result<Post, AppError> {
    scope
        .db()
        .find_post(id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Post, id))
}

async fn ensure_unique_code(
    scope: &mut Scope,
    current_id: Option<&str>,
    code: &str,
) -> Result<(), AppError> {
    if let Some(existing) = scope.db().find_post_by_code(code).await? {
        if Some(existing.id.as_str()) != current_id {
            return Err(AppError::conflict(EntityKind::Post, "code", code));
        }
    }
    Ok(())
}
