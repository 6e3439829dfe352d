//! Read-only structural queries over a [`WorkflowTree`].
//!
//! These are free functions so that views (layout, export) never need
//! mutable access to the tree.

use super::{NodeId, WorkflowTree};
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};

/// Grid position of a node for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePosition {
    /// Distance from the root.
    pub depth: usize,
    /// Leaf-ordered column; parents sit on their first child's column.
    pub column: usize,
}

/// Node ids in pre-order, children visited in insertion order.
///
/// Each node is visited once even if the links are corrupt.
pub fn depth_first_order(tree: &WorkflowTree) -> Vec<NodeId> {
    match tree.root() {
        Some(root) => walk(tree, root),
        None => Vec::new(),
    }
}

/// The node and all of its descendants, in pre-order.
pub fn subtree_ids(tree: &WorkflowTree, node_id: NodeId) -> Result<Vec<NodeId>> {
    tree.node(node_id)?;
    Ok(walk(tree, node_id))
}

fn walk(tree: &WorkflowTree, start: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![start];

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Ok(node) = tree.node(id) else {
            continue;
        };
        order.push(id);
        stack.extend(node.children().iter().rev().copied());
    }
    order
}

/// Leaf ids in pre-order.
pub fn leaf_ids(tree: &WorkflowTree) -> Vec<NodeId> {
    depth_first_order(tree)
        .into_iter()
        .filter(|&id| tree.node(id).is_ok_and(|n| n.is_leaf()))
        .collect()
}

/// `(parent, child)` edges in pre-order of the child.
pub fn connections(tree: &WorkflowTree) -> Vec<(NodeId, NodeId)> {
    depth_first_order(tree)
        .into_iter()
        .filter_map(|id| {
            tree.node(id)
                .ok()
                .and_then(|n| n.parent())
                .map(|parent| (parent, id))
        })
        .collect()
}

/// Distance of every reachable node from the root.
pub fn node_depths(tree: &WorkflowTree) -> BTreeMap<NodeId, usize> {
    let mut depths = BTreeMap::new();
    for id in depth_first_order(tree) {
        let depth = tree
            .node(id)
            .ok()
            .and_then(|n| n.parent())
            .and_then(|parent| depths.get(&parent))
            .map_or(0, |d| d + 1);
        depths.insert(id, depth);
    }
    depths
}

/// Grid positions for drawing the tree.
///
/// Leaves take consecutive columns in pre-order; an interior node shares
/// the column of its first child.
pub fn layout_positions(tree: &WorkflowTree) -> BTreeMap<NodeId, NodePosition> {
    let depths = node_depths(tree);
    let mut columns: BTreeMap<NodeId, usize> = BTreeMap::new();

    let mut next_column = 0;
    for id in leaf_ids(tree) {
        columns.insert(id, next_column);
        next_column += 1;
    }

    // Post-order: reverse pre-order visits children before parents.
    for id in depth_first_order(tree).into_iter().rev() {
        if columns.contains_key(&id) {
            continue;
        }
        let column = tree
            .node(id)
            .ok()
            .and_then(|n| n.children().first().copied())
            .and_then(|child| columns.get(&child).copied())
            .unwrap_or(0);
        columns.insert(id, column);
    }

    depths
        .into_iter()
        .map(|(id, depth)| {
            let column = columns.get(&id).copied().unwrap_or(0);
            (id, NodePosition { depth, column })
        })
        .collect()
}
