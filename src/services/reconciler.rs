//! 关联关系调和
//!
//! 给定 owner 的期望目标集合，计算与当前已持久化集合的最小差异并在一个事务中应用。

use crate::{
    error::{AppError, ErrorKind},
    models::{association::EdgeKind, EntityKind},
    transaction::Scope,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, str::FromStr};

/// 调和模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// 持久化集合变为期望集合
    Replace,
    /// 只增加缺失的边
    Add,
    /// 只删除给定的边
    Remove,
}

impl ReconcileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileMode::Replace => "replace",
            ReconcileMode::Add => "add",
            ReconcileMode::Remove => "remove",
        }
    }
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 外部传入的模式字符串只在这里解析
impl FromStr for ReconcileMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" | "set" => Ok(ReconcileMode::Replace),
            "add" => Ok(ReconcileMode::Add),
            "remove" => Ok(ReconcileMode::Remove),
            _ => Err(AppError::InvalidOperationMode(s.to_string())),
        }
    }
}

/// 实际生效的变更
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// 关联关系调和器
#[derive(Debug, Clone, Copy, Default)]
pub struct AssociationReconciler;

impl AssociationReconciler {
    pub fn new() -> Self {
        Self
    }

    /// 调和一个 owner 的边集合
    ///
    /// 在作用域已有事务时复用该事务，否则开启新事务。任何一步失败都会使整个调和回滚。
    pub async fn reconcile(
        &self,
        scope: &mut Scope,
        kind: EdgeKind,
        owner_id: &str,
        desired: &[String],
        mode: ReconcileMode,
    ) -> Result<ReconcileOutcome, AppError> {
        let owner = owner_id.to_string();
        let desired = dedup(desired);

        let result = scope
            .run_in_transaction(move |s| {
                Box::pin(async move { apply(s, kind, &owner, desired, mode).await })
            })
            .await;

        match &result {
            Ok(outcome) if !outcome.is_noop() => {
                metrics::counter!("authz.reconcile.edges_added", "kind" => kind.as_str())
                    .increment(outcome.added.len() as u64);
                metrics::counter!("authz.reconcile.edges_removed", "kind" => kind.as_str())
                    .increment(outcome.removed.len() as u64);
                tracing::debug!(
                    tenant_id = %scope.ctx().tenant_id,
                    owner_id = %owner_id,
                    kind = %kind,
                    mode = %mode,
                    added = ?outcome.added,
                    removed = ?outcome.removed,
                    "Associations reconciled"
                );
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Internal || e.kind() == ErrorKind::Timeout => {
                tracing::error!(
                    tenant_id = %scope.ctx().tenant_id,
                    owner_id = %owner_id,
                    kind = %kind,
                    mode = %mode,
                    error = %e,
                    "Failed to reconcile associations"
                );
            }
            Err(e) => {
                tracing::warn!(
                    owner_id = %owner_id,
                    kind = %kind,
                    mode = %mode,
                    error = %e,
                    "Association reconciliation rejected"
                );
            }
        }

        result
    }
}

/// 去重并保持首次出现的顺序
fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

async fn apply(
    scope: &mut Scope,
    kind: EdgeKind,
    owner_id: &str,
    desired: Vec<String>,
    mode: ReconcileMode,
) -> Result<ReconcileOutcome, AppError> {
    // 先锁 owner 再读当前集合，同一 owner 的并发调和按顺序看到彼此的结果
    lock_owner(scope, kind.owner(), owner_id).await?;

    if mode != ReconcileMode::Remove {
        ensure_targets(scope, kind.target(), &desired).await?;
    }

    let current = scope.db().edge_targets(kind, owner_id).await?;
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

    let to_add: Vec<String> = match mode {
        ReconcileMode::Replace | ReconcileMode::Add => desired
            .iter()
            .filter(|id| !current_set.contains(id.as_str()))
            .cloned()
            .collect(),
        ReconcileMode::Remove => Vec::new(),
    };

    let to_remove: Vec<String> = match mode {
        ReconcileMode::Replace => current
            .iter()
            .filter(|id| !desired_set.contains(id.as_str()))
            .cloned()
            .collect(),
        ReconcileMode::Remove => current
            .iter()
            .filter(|id| desired_set.contains(id.as_str()))
            .cloned()
            .collect(),
        ReconcileMode::Add => Vec::new(),
    };

    if mode == ReconcileMode::Replace && desired.is_empty() {
        scope.db().delete_all_edges(kind, owner_id).await?;
    } else if !to_remove.is_empty() {
        scope.db().delete_edges(kind, owner_id, &to_remove).await?;
    }

    if !to_add.is_empty() {
        scope.db().insert_edges(kind, owner_id, &to_add).await?;
    }

    Ok(ReconcileOutcome {
        added: to_add,
        removed: to_remove,
    })
}

/// 锁定 owner 行直到事务结束；不可见时返回 `NotFound`
pub(crate) async fn lock_owner(
    scope: &mut Scope,
    entity: EntityKind,
    owner_id: &str,
) -> Result<(), AppError> {
    if !scope.db().lock_row(entity, owner_id).await? {
        return Err(AppError::not_found(entity, owner_id));
    }
    Ok(())
}

/// 一次批量存在性校验
pub(crate) async fn ensure_targets(
    scope: &mut Scope,
    entity: EntityKind,
    ids: &[String],
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }

    let found = scope.db().existing_ids(entity, ids).await?;
    let missing: Vec<String> = ids.iter().filter(|id| !found.contains(*id)).cloned().collect();

    if !missing.is_empty() {
        return Err(AppError::InvalidReference {
            entity,
            ids: missing,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!("replace".parse::<ReconcileMode>().unwrap(), ReconcileMode::Replace);
        assert_eq!(" Add ".parse::<ReconcileMode>().unwrap(), ReconcileMode::Add);
        assert_eq!("REMOVE".parse::<ReconcileMode>().unwrap(), ReconcileMode::Remove);
    }

    #[test]
    fn test_unknown_mode_is_invalid_operation_mode() {
        let err = "merge".parse::<ReconcileMode>().unwrap_err();
        assert!(matches!(err, AppError::InvalidOperationMode(ref m) if m == "merge"));
        assert_eq!(err.kind(), ErrorKind::InvalidOperationMode);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let ids = vec!["b".to_string(), "a".into(), "b".into(), " ".into(), "c".into()];
        assert_eq!(dedup(&ids), vec!["b", "a", "c"]);
    }
}
