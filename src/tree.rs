//! 树构建
//!
//! 先建立 `id -> 下标` 索引（只读阶段），再按输入顺序把每个节点挂到父节点的
//! 子列表中。组装、遍历与释放都不递归，任意深度的链都不会耗尽调用栈。父节点不在输入集合内的节点视为额外的根节点，这样部分过滤后的列表
//! 依然可以展示。数据已损坏形成环时，环上的节点会被摘下来作为根节点，不会丢失，
//! 也不会死循环。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// 根节点哨兵值
const ROOT_SENTINELS: [&str; 2] = ["", "0"];

/// 可以组成树的节点
pub trait TreeNode {
    fn node_id(&self) -> &str;
    fn parent_id(&self) -> Option<&str>;

    /// 排序键：`sort` 字段，其次创建时间
    fn sort_key(&self) -> (i32, DateTime<Utc>);
}

/// 父 ID 是否指向根
pub fn is_root_ref(parent_id: Option<&str>) -> bool {
    match parent_id {
        None => true,
        Some(p) => ROOT_SENTINELS.contains(&p.trim()),
    }
}

/// 把外部传入的父 ID 规范化：根哨兵值统一为 `None`
pub fn normalize_parent(parent_id: Option<String>) -> Option<String> {
    parent_id.filter(|p| !is_root_ref(Some(p.as_str())))
}

/// 树节点
#[derive(Debug, Clone, Serialize)]
pub struct Tree<T> {
    #[serde(flatten)]
    pub node: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Tree<T>>,
}

impl<T> Tree<T> {
    /// 子树节点总数（含自身）
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// 先序遍历
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let current = stack.pop()?;
            stack.extend(current.children.iter().rev());
            Some(&current.node)
        })
    }
}

impl<T> Drop for Tree<T> {
    // 默认的析构会沿子树递归；这里把子节点摊平后逐个释放
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut tree) = pending.pop() {
            pending.append(&mut tree.children);
        }
    }
}

/// 森林节点总数
pub fn forest_len<T>(forest: &[Tree<T>]) -> usize {
    forest.iter().map(Tree::len).sum()
}

/// 按 `sort` 字段、创建时间稳定排序
pub fn sort_for_tree<T: TreeNode>(nodes: &mut [T]) {
    nodes.sort_by_key(|n| n.sort_key());
}

/// 构建森林
///
/// O(n) 时间与空间。子节点保持输入顺序；需要排序的调用方先调用 [`sort_for_tree`]。
pub fn build_tree<T: TreeNode>(nodes: Vec<T>) -> Vec<Tree<T>> {
    // 第一阶段：索引
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.node_id(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        let parent = node
            .parent_id()
            .filter(|p| !is_root_ref(Some(*p)))
            .and_then(|p| index.get(p).copied())
            .filter(|&p| p != i);

        match parent {
            Some(p) => children[p].push(i),
            None => roots.push(i),
        }
    }
    drop(index);

    // 第二阶段：只追加的组装
    let mut slots: Vec<Option<T>> = nodes.into_iter().map(Some).collect();
    let mut forest: Vec<Tree<T>> = roots
        .into_iter()
        .filter_map(|r| assemble(r, &mut slots, &children))
        .collect();

    // 剩下的节点只可能位于环上
    for i in 0..slots.len() {
        if slots[i].is_some() {
            if let Some(tree) = assemble(i, &mut slots, &children) {
                tracing::warn!(
                    node_id = %tree.node.node_id(),
                    "Cycle detected in hierarchy, node detached as root"
                );
                forest.push(tree);
            }
        }
    }

    forest
}

/// 组装中的节点：下一个待访问的子节点位置与已完成的子树
struct Frame<T> {
    idx: usize,
    node: T,
    next: usize,
    kids: Vec<Tree<T>>,
}

/// 以显式栈做后序组装。节点入栈时即从 `slots` 取出，已取出的节点不会被再次访问
fn assemble<T>(root: usize, slots: &mut [Option<T>], children: &[Vec<usize>]) -> Option<Tree<T>> {
    let node = slots[root].take()?;
    let mut stack = vec![Frame {
        idx: root,
        node,
        next: 0,
        kids: Vec::new(),
    }];

    loop {
        let frame = stack.last_mut()?;
        if let Some(&child) = children[frame.idx].get(frame.next) {
            frame.next += 1;
            if let Some(node) = slots[child].take() {
                stack.push(Frame {
                    idx: child,
                    node,
                    next: 0,
                    kids: Vec::new(),
                });
            }
            continue;
        }

        let done = stack.pop()?;
        let tree = Tree {
            node: done.node,
            children: done.kids,
        };
        match stack.last_mut() {
            Some(parent) => parent.kids.push(tree),
            None => return Some(tree),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    struct Node {
        id: &'static str,
        parent: Option<&'static str>,
        sort: i32,
    }

    impl TreeNode for Node {
        fn node_id(&self) -> &str {
            self.id
        }

        fn parent_id(&self) -> Option<&str> {
            self.parent
        }

        fn sort_key(&self) -> (i32, DateTime<Utc>) {
            (self.sort, DateTime::<Utc>::default())
        }
    }

    fn n(id: &'static str, parent: Option<&'static str>) -> Node {
        Node { id, parent, sort: 0 }
    }

    fn ids<T: TreeNode>(forest: &[Tree<T>]) -> Vec<String> {
        forest.iter().map(|t| t.node.node_id().to_string()).collect()
    }

    #[test]
    fn test_build_simple_tree() {
        let forest = build_tree(vec![
            n("1", None),
            n("2", Some("1")),
            n("3", Some("1")),
            n("4", Some("2")),
        ]);

        assert_eq!(ids(&forest), vec!["1"]);
        assert_eq!(ids(&forest[0].children), vec!["2", "3"]);
        assert_eq!(ids(&forest[0].children[0].children), vec!["4"]);
        assert_eq!(forest_len(&forest), 4);
    }

    #[test]
    fn test_children_follow_input_order() {
        let forest = build_tree(vec![n("c", Some("p")), n("p", None), n("a", Some("p"))]);
        assert_eq!(ids(&forest[0].children), vec!["c", "a"]);
    }

    #[test]
    fn test_root_sentinels() {
        let forest = build_tree(vec![n("1", Some("0")), n("2", Some("")), n("3", None)]);
        assert_eq!(ids(&forest), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_missing_parent_becomes_root() {
        let forest = build_tree(vec![n("1", None), n("2", Some("missing")), n("3", Some("2"))]);

        assert_eq!(ids(&forest), vec!["1", "2"]);
        assert_eq!(ids(&forest[1].children), vec!["3"]);
    }

    #[test]
    fn test_self_parent_becomes_root() {
        let forest = build_tree(vec![n("1", Some("1"))]);
        assert_eq!(ids(&forest), vec!["1"]);
        assert!(forest[0].is_leaf());
    }

    #[test]
    fn test_cycle_is_detached_without_losing_nodes() {
        let forest = build_tree(vec![
            n("root", None),
            n("a", Some("b")),
            n("b", Some("a")),
            n("c", Some("a")),
        ]);

        assert_eq!(forest_len(&forest), 4);
        assert_eq!(ids(&forest), vec!["root", "a"]);
        assert_eq!(ids(&forest[1].children), vec!["b", "c"]);
    }

    #[test]
    fn test_round_trip_every_node_once() {
        let input = vec![
            n("1", None),
            n("2", Some("1")),
            n("3", Some("2")),
            n("4", Some("2")),
            n("5", None),
            n("6", Some("5")),
            n("7", Some("3")),
        ];
        let forest = build_tree(input.clone());

        assert_eq!(forest_len(&forest), input.len());
        let seen: Vec<&str> = forest.iter().flat_map(|t| t.iter()).map(|n| n.id).collect();
        let unique: HashSet<&str> = seen.iter().copied().collect();
        assert_eq!(seen.len(), unique.len());
        assert_eq!(unique.len(), input.len());
    }

    #[test]
    fn test_sort_is_stable() {
        let mut nodes = vec![
            Node { id: "b", parent: None, sort: 2 },
            Node { id: "a", parent: None, sort: 1 },
            Node { id: "c", parent: None, sort: 2 },
        ];
        sort_for_tree(&mut nodes);
        let order: Vec<&str> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[derive(Debug)]
    struct Owned {
        id: String,
        parent: Option<String>,
    }

    impl TreeNode for Owned {
        fn node_id(&self) -> &str {
            &self.id
        }

        fn parent_id(&self) -> Option<&str> {
            self.parent.as_deref()
        }

        fn sort_key(&self) -> (i32, DateTime<Utc>) {
            (0, DateTime::<Utc>::default())
        }
    }

    #[test]
    fn test_deep_chain_does_not_exhaust_stack() {
        const DEPTH: usize = 100_000;
        let nodes: Vec<Owned> = (0..DEPTH)
            .map(|i| Owned {
                id: i.to_string(),
                parent: i.checked_sub(1).map(|p| p.to_string()),
            })
            .collect();

        let forest = build_tree(nodes);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest_len(&forest), DEPTH);

        let mut depth = 0;
        let mut cursor = Some(&forest[0]);
        while let Some(tree) = cursor {
            assert_eq!(tree.node.id, depth.to_string());
            depth += 1;
            cursor = tree.children.first();
        }
        assert_eq!(depth, DEPTH);

        drop(forest);
    }

    #[test]
    fn test_deep_cycle_is_detached() {
        // 0 -> 1 -> ... -> n-1 -> 0，整条链成环
        const DEPTH: usize = 50_000;
        let nodes: Vec<Owned> = (0..DEPTH)
            .map(|i| Owned {
                id: i.to_string(),
                parent: Some(((i + DEPTH - 1) % DEPTH).to_string()),
            })
            .collect();

        let forest = build_tree(nodes);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].node.id, "0");
        assert_eq!(forest_len(&forest), DEPTH);
    }

    #[test]
    fn test_empty_input() {
        let forest: Vec<Tree<Node>> = build_tree(Vec::new());
        assert!(forest.is_empty());
    }

    #[test]
    fn test_normalize_parent() {
        assert_eq!(normalize_parent(Some("0".into())), None);
        assert_eq!(normalize_parent(Some(" ".into())), None);
        assert_eq!(normalize_parent(Some("d1".into())), Some("d1".into()));
    }
}
