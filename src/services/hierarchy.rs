//! 层级一致性校验

use crate::{error::AppError, models::EntityKind, tree::TreeNode};
use std::collections::{HashMap, HashSet, VecDeque};

/// 校验把 `id` 的父节点改为 `parent_id` 不会形成环
///
/// 沿着新父节点向上遍历祖先链，遇到 `id` 本身即拒绝。`nodes` 是同一范围内的全部
/// 可见节点；新父节点必须在其中。
pub fn ensure_acyclic_parent<T: TreeNode>(
    entity: EntityKind,
    id: &str,
    parent_id: Option<&str>,
    nodes: &[T],
) -> Result<(), AppError> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };

    let invalid = || AppError::InvalidParent {
        entity,
        id: id.to_string(),
        parent_id: parent_id.to_string(),
    };

    let parents: HashMap<&str, Option<&str>> = nodes
        .iter()
        .map(|n| (n.node_id(), n.parent_id()))
        .collect();

    if !parents.contains_key(parent_id) {
        return Err(invalid());
    }

    let mut visited = HashSet::new();
    let mut current = Some(parent_id);

    while let Some(node) = current {
        if node == id {
            return Err(invalid());
        }
        // 已有数据中存在环
        if !visited.insert(node) {
            tracing::warn!(
                entity = %entity,
                node_id = %node,
                "Existing cycle found while walking ancestors"
            );
            return Err(invalid());
        }
        current = parents
            .get(node)
            .copied()
            .flatten()
            .filter(|p| !crate::tree::is_root_ref(Some(*p)));
    }

    Ok(())
}

/// `roots` 及其全部后代的 ID
pub fn descendant_ids<T: TreeNode>(nodes: &[T], roots: &[String]) -> HashSet<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        if let Some(parent) = node.parent_id() {
            children.entry(parent).or_default().push(node.node_id());
        }
    }

    let known: HashSet<&str> = nodes.iter().map(|n| n.node_id()).collect();
    let mut out: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<&str> = roots
        .iter()
        .map(String::as_str)
        .filter(|r| known.contains(r))
        .collect();

    while let Some(id) = queue.pop_front() {
        if !out.insert(id.to_string()) {
            continue;
        }
        if let Some(kids) = children.get(id) {
            queue.extend(kids.iter().copied());
        }
    }

    out
}
