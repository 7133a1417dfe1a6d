//! 部门管理服务

use super::hierarchy::{descendant_ids, ensure_acyclic_parent};
use crate::{
    context::RequestContext,
    error::AppError,
    ids::IdGenerator,
    models::{
        association::EdgeKind,
        dept::{CreateDeptRequest, Dept, UpdateDeptRequest},
        EntityKind, Status,
    },
    transaction::{Gateway, Scope},
    tree::{build_tree, normalize_parent, sort_for_tree, Tree},
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct DeptService {
    gateway: Gateway,
    ids: Arc<dyn IdGenerator>,
}

impl DeptService {
    pub fn new(gateway: Gateway, ids: Arc<dyn IdGenerator>) -> Self {
        Self { gateway, ids }
    }

    /// 创建部门。父部门必须在当前租户内存在，同级名称唯一
    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreateDeptRequest,
    ) -> Result<Dept, AppError> {
        req.validate()?;
        let id = self.ids.next_id(EntityKind::Dept);

        let dept = self
            .gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let parent_id = normalize_parent(req.parent_id);
                    if let Some(parent) = parent_id.as_deref() {
                        if scope.db().find_dept(parent).await?.is_none() {
                            return Err(AppError::InvalidParent {
                                entity: EntityKind::Dept,
                                id: id.clone(),
                                parent_id: parent.to_string(),
                            });
                        }
                    }
                    ensure_unique_name(scope, None, parent_id.as_deref(), &req.name).await?;

                    let now = Utc::now();
                    let dept = Dept {
                        id,
                        tenant_id: scope.ctx().tenant_id.to_string(),
                        parent_id,
                        name: req.name,
                        sort: req.sort,
                        leader: req.leader,
                        phone: req.phone,
                        email: req.email,
                        status: Status::Enabled,
                        created_at: now,
                        updated_at: now,
                        deleted_at: None,
                    };
                    scope.db().insert_dept(&dept).await?;
                    Ok(dept)
                })
            })
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id, dept_id = %dept.id, "Department created");
        Ok(dept)
    }

    /// 更新部门。新父节点是自身或后代时返回 InvalidParent，层级保持不变
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        req: UpdateDeptRequest,
    ) -> Result<Dept, AppError> {
        req.validate()?;
        let id = id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    let mut dept = load_dept(scope, &id).await?;

                    if let Some(parent) = req.parent_id {
                        let parent = normalize_parent(Some(parent));
                        if parent != dept.parent_id {
                            let all = scope.db().list_depts().await?;
                            ensure_acyclic_parent(EntityKind::Dept, &id, parent.as_deref(), &all)?;
                            dept.parent_id = parent;
                        }
                    }
                    if let Some(name) = req.name {
                        dept.name = name;
                    }
                    ensure_unique_name(scope, Some(id.as_str()), dept.parent_id.as_deref(), &dept.name)
                        .await?;

                    if let Some(sort) = req.sort {
                        dept.sort = sort;
                    }
                    if req.leader.is_some() {
                        dept.leader = req.leader;
                    }
                    if req.phone.is_some() {
                        dept.phone = req.phone;
                    }
                    if req.email.is_some() {
                        dept.email = req.email;
                    }
                    if let Some(status) = req.status {
                        dept.status = status;
                    }
                    dept.updated_at = Utc::now();

                    if !scope.db().update_dept(&dept).await? {
                        return Err(AppError::not_found(EntityKind::Dept, &id));
                    }
                    Ok(dept)
                })
            })
            .await
    }

    /// 删除部门。存在子部门或仍有用户归属时拒绝
    pub async fn delete(&self, ctx: &RequestContext, dept_id: &str) -> Result<(), AppError> {
        let id = dept_id.to_string();

        self.gateway
            .run_in_transaction(ctx, move |scope| {
                Box::pin(async move {
                    load_dept(scope, &id).await?;

                    let children = scope.db().count_child_depts(&id).await?;
                    if children > 0 {
                        return Err(AppError::precondition(
                            EntityKind::Dept,
                            &id,
                            format!("has {} child department(s)", children),
                        ));
                    }

                    let users = scope.db().edge_owners(EdgeKind::UserDept, &id).await?;
                    if !users.is_empty() {
                        return Err(AppError::precondition(
                            EntityKind::Dept,
                            &id,
                            format!("has {} member(s)", users.len()),
                        ));
                    }

                    scope
                        .db()
                        .delete_edges_by_target(EdgeKind::RoleDept, &id)
                        .await?;
                    scope.db().soft_delete_dept(&id).await?;
                    Ok(())
                })
            })
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id, dept_id = %dept_id, "Department deleted");
        Ok(())
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Dept, AppError> {
        let id = id.to_string();
        self.gateway
            .run(ctx, move |scope| Box::pin(async move { load_dept(scope, &id).await }))
            .await
    }

    /// 部门树
    pub async fn tree(&self, ctx: &RequestContext) -> Result<Vec<Tree<Dept>>, AppError> {
        self.gateway
            .run(ctx, |scope| {
                Box::pin(async move {
                    let mut depts = scope.db().list_depts().await?;
                    sort_for_tree(&mut depts);
                    Ok(build_tree(depts))
                })
            })
            .await
    }

    /// 部门自身及全部后代的 ID
    pub async fn descendant_ids(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<Vec<String>, AppError> {
        let id = id.to_string();

        self.gateway
            .run(ctx, move |scope| {
                Box::pin(async move {
                    load_dept(scope, &id).await?;
                    let depts = scope.db().list_depts().await?;
                    let mut ids: Vec<String> = descendant_ids(&depts, &[id]).into_iter().collect();
                    ids.sort();
                    Ok(ids)
                })
            })
            .await
    }
}

async fn load_dept(scope: &mut Scope, id: &str) -> Result<Dept, AppError> {
    scope
        .db()
        .find_dept(id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Dept, id))
}

/// 同级部门名称唯一
async fn ensure_unique_name(
    scope: &mut Scope,
    current_id: Option<&str>,
    parent_id: Option<&str>,
    name: &str,
) -> Result<(), AppError> {
    if let Some(existing) = scope.db().find_dept_by_name(parent_id, name).await? {
        if Some(existing.id.as_str()) != current_id {
            return Err(AppError::conflict(EntityKind::Dept, "name", name));
        }
    }
    Ok(())
}
