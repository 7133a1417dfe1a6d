//! 数据权限解析
//!
//! 把用户各个启用角色的 `data_scope` 合并成一个行级过滤条件。

use super::{
    hierarchy::descendant_ids,
    permission_service::{enabled_roles, report_dangling},
};
use crate::{
    context::RequestContext,
    error::AppError,
    models::{association::EdgeKind, role::DataScope, EntityKind},
    transaction::{Gateway, Scope},
};
use serde::Serialize;
use std::collections::BTreeSet;

/// 行级可见范围
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataScopeFilter {
    /// 租户内全部行
    All,
    Restricted {
        dept_ids: BTreeSet<String>,
        /// 是否可见本人创建的行
        include_own: bool,
    },
}

impl DataScopeFilter {
    fn nothing() -> Self {
        DataScopeFilter::Restricted {
            dept_ids: BTreeSet::new(),
            include_own: false,
        }
    }

    /// 某行（所属部门、创建人）是否可见
    pub fn allows(&self, dept_id: Option<&str>, owner_id: &str, user_id: &str) -> bool {
        match self {
            DataScopeFilter::All => true,
            DataScopeFilter::Restricted {
                dept_ids,
                include_own,
            } => {
                (*include_own && owner_id == user_id)
                    || dept_id.is_some_and(|d| dept_ids.contains(d))
            }
        }
    }
}

#[derive(Clone)]
pub struct DataScopeResolver {
    gateway: Gateway,
}

impl DataScopeResolver {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> Result<DataScopeFilter, AppError> {
        let user_id = user_id.to_string();
        self.gateway
            .run(ctx, move |scope| {
                Box::pin(async move { resolve_in(scope, &user_id).await })
            })
            .await
    }
}

async fn resolve_in(scope: &mut Scope, user_id: &str) -> Result<DataScopeFilter, AppError> {
    let user = scope
        .db()
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::User, user_id))?;

    if !user.status.is_enabled() {
        return Ok(DataScopeFilter::nothing());
    }

    let roles = enabled_roles(scope, user_id).await?;
    if roles.is_empty() {
        return Ok(DataScopeFilter::Restricted {
            dept_ids: BTreeSet::new(),
            include_own: true,
        });
    }

    if roles.iter().any(|r| r.data_scope == DataScope::All) {
        return Ok(DataScopeFilter::All);
    }

    let mut dept_ids = BTreeSet::new();
    let mut include_own = false;
    let mut own_depts: Option<Vec<String>> = None;

    for role in &roles {
        match role.data_scope {
            DataScope::All => {}
            DataScope::Own => include_own = true,
            DataScope::Dept => {
                dept_ids.extend(user_depts(scope, user_id, &mut own_depts).await?);
            }
            DataScope::DeptAndChildren => {
                let roots = user_depts(scope, user_id, &mut own_depts).await?;
                let depts = scope.db().list_depts().await?;
                dept_ids.extend(descendant_ids(&depts, &roots));
            }
            DataScope::Custom => {
                let targets = scope.db().edge_targets(EdgeKind::RoleDept, &role.id).await?;
                let found = scope.db().existing_ids(EntityKind::Dept, &targets).await?;
                report_dangling(
                    EdgeKind::RoleDept,
                    user_id,
                    &targets,
                    found.iter().map(String::as_str),
                );
                dept_ids.extend(found);
            }
        }
    }

    Ok(DataScopeFilter::Restricted {
        dept_ids,
        include_own,
    })
}

/// 用户所属的可见部门，只查询一次
async fn user_depts(
    scope: &mut Scope,
    user_id: &str,
    cache: &mut Option<Vec<String>>,
) -> Result<Vec<String>, AppError> {
    if let Some(ids) = cache {
        return Ok(ids.clone());
    }

    let targets = scope.db().edge_targets(EdgeKind::UserDept, user_id).await?;
    let found = scope.db().existing_ids(EntityKind::Dept, &targets).await?;
    report_dangling(
        EdgeKind::UserDept,
        user_id,
        &targets,
        found.iter().map(String::as_str),
    );

    let ids: Vec<String> = targets.into_iter().filter(|id| found.contains(id)).collect();
    *cache = Some(ids.clone());
    Ok(ids)
}
