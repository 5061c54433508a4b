//! Read-only tree queries over the connection graph.
//!
//! The layout tree is derived, not stored: a node's parent is the source of
//! its first incoming connection. The underlying data may still contain
//! cycles, so every walk here carries a visited set and stops at the first
//! repeat instead of trusting the chain to end.

use crate::error::MindMapError;
use crate::id::NodeId;
use crate::model::MindMap;
use std::collections::HashSet;

/// Targets of connections leaving `id`, in connection order, without repeats
/// (parallel word-anchored links count once).
pub fn children_of(map: &MindMap, id: NodeId) -> Vec<NodeId> {
    let mut children = Vec::new();
    for conn in map.outgoing(id) {
        if !children.contains(&conn.target) {
            children.push(conn.target);
        }
    }
    children
}

/// Source of the first connection arriving at `id`.
pub fn parent_of(map: &MindMap, id: NodeId) -> Option<NodeId> {
    map.incoming(id).first().map(|c| c.source)
}

pub fn is_root(map: &MindMap, id: NodeId) -> bool {
    parent_of(map, id).is_none()
}

/// `children_of(parent_of(id))` minus `id`. Roots have no siblings.
pub fn siblings_of(map: &MindMap, id: NodeId) -> Vec<NodeId> {
    match parent_of(map, id) {
        Some(parent) => children_of(map, parent)
            .into_iter()
            .filter(|c| *c != id)
            .collect(),
        None => Vec::new(),
    }
}

/// Walk up the primary-parent chain to a node without a parent.
///
/// A cycle is an invariant defect: it is logged and the walk returns the
/// last node reached before the chain repeated.
pub fn root_of(map: &MindMap, id: NodeId) -> NodeId {
    ancestors_of(map, id).last().copied().unwrap_or(id)
}

/// Ancestors of `id`, nearest first. Cycle-guarded like `root_of`.
pub fn ancestors_of(map: &MindMap, id: NodeId) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(id);
    let mut current = id;
    while let Some(parent) = parent_of(map, current) {
        if !visited.insert(parent) {
            log::error!("parent cycle detected walking up from {id} (repeats at {parent})");
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain
}

pub fn depth_of(map: &MindMap, id: NodeId) -> usize {
    ancestors_of(map, id).len()
}

pub fn is_ancestor_of(map: &MindMap, ancestor: NodeId, descendant: NodeId) -> bool {
    ancestor != descendant && ancestors_of(map, descendant).contains(&ancestor)
}

/// `id` followed by every descendant in pre-order. Each node appears once
/// even when the graph reaches it through several paths.
pub fn subtree_of(map: &MindMap, id: NodeId) -> Vec<NodeId> {
    if !map.contains(id) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        out.push(current);
        // Reverse so the first child is visited first.
        for child in children_of(map, current).into_iter().rev() {
            if !visited.contains(&child) {
                stack.push(child);
            }
        }
    }
    out
}

/// Every node without a parent, in arena order.
pub fn roots(map: &MindMap) -> Vec<NodeId> {
    map.nodes()
        .map(|n| n.id)
        .filter(|id| is_root(map, *id))
        .collect()
}

/// Check that no primary-parent chain cycles.
pub fn validate_tree(map: &MindMap) -> Result<(), MindMapError> {
    for start in map.node_ids() {
        validate_chain(map, start)?;
    }
    Ok(())
}

/// Check one primary-parent chain, returning its root.
pub fn validate_chain(map: &MindMap, id: NodeId) -> Result<NodeId, MindMapError> {
    if !map.contains(id) {
        return Err(MindMapError::UnknownNode(id));
    }
    let mut visited = HashSet::new();
    visited.insert(id);
    let mut current = id;
    while let Some(parent) = parent_of(map, current) {
        if !visited.insert(parent) {
            return Err(MindMapError::ParentCycle {
                start: id,
                repeat: parent,
            });
        }
        current = parent;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Connection, Node, TextRange};
    use kurbo::Point;
    use pretty_assertions::assert_eq;

    fn build(names: &[&str], links: &[(&str, &str)]) -> MindMap {
        let mut map = MindMap::new();
        for name in names {
            map.add_node(Node::new(NodeId::intern(name), Point::ZERO));
        }
        for (s, t) in links {
            map.add_connection(Connection::new(NodeId::intern(s), NodeId::intern(t)));
        }
        map
    }

    #[test]
    fn tree_navigation() {
        let map = build(
            &["g_r", "g_a", "g_b", "g_a1", "g_a2"],
            &[("g_r", "g_a"), ("g_r", "g_b"), ("g_a", "g_a1"), ("g_a", "g_a2")],
        );
        let id = NodeId::intern;
        assert_eq!(children_of(&map, id("g_r")), vec![id("g_a"), id("g_b")]);
        assert_eq!(parent_of(&map, id("g_a1")), Some(id("g_a")));
        assert_eq!(siblings_of(&map, id("g_a1")), vec![id("g_a2")]);
        assert!(siblings_of(&map, id("g_r")).is_empty());
        assert_eq!(root_of(&map, id("g_a2")), id("g_r"));
        assert_eq!(depth_of(&map, id("g_a2")), 2);
        assert!(is_ancestor_of(&map, id("g_r"), id("g_a1")));
        assert!(!is_ancestor_of(&map, id("g_b"), id("g_a1")));
        assert_eq!(
            subtree_of(&map, id("g_a")),
            vec![id("g_a"), id("g_a1"), id("g_a2")]
        );
        assert_eq!(roots(&map), vec![id("g_r")]);
        assert!(validate_tree(&map).is_ok());
    }

    #[test]
    fn parallel_links_yield_one_child() {
        let mut map = build(&["pl_a", "pl_b"], &[]);
        let (a, b) = (NodeId::intern("pl_a"), NodeId::intern("pl_b"));
        map.add_connection(Connection::new(a, b).with_anchors([TextRange::new(0, 2)]));
        map.add_connection(Connection::new(a, b).with_anchors([TextRange::new(3, 5)]));
        assert_eq!(children_of(&map, a), vec![b]);
    }

    #[test]
    fn cycles_terminate_and_are_reported() {
        let map = build(
            &["cy_a", "cy_b", "cy_c"],
            &[("cy_a", "cy_b"), ("cy_b", "cy_c"), ("cy_c", "cy_a")],
        );
        let id = NodeId::intern;
        // Walk stops instead of spinning.
        let r = root_of(&map, id("cy_a"));
        assert!([id("cy_a"), id("cy_b"), id("cy_c")].contains(&r));
        assert_eq!(subtree_of(&map, id("cy_a")).len(), 3);
        assert!(matches!(
            validate_tree(&map),
            Err(MindMapError::ParentCycle { .. })
        ));
        assert!(validate_chain(&map, id("cy_b")).is_err());
        assert_eq!(
            validate_chain(&map, NodeId::intern("cy_missing")),
            Err(MindMapError::UnknownNode(NodeId::intern("cy_missing")))
        );
    }
}
