//! The workflow tree: node ownership, structural edits and execution.

use super::node::TreeNode;
use super::topology;
use super::NodeId;
use crate::data::Dataset;
use crate::error::{Result, WorkflowError};
use crate::plugin::{Kwargs, ParamValue, Plugin, PluginInput, PluginType, FRAME_INDEX_KEY};
use crate::scan::ExecutionContext;
use std::collections::BTreeMap;

/// Retained results of one frame, keyed by node id.
pub type FrameResults = BTreeMap<NodeId, Dataset>;

/// Rooted tree of plugin nodes.
///
/// The tree owns every node; parent and child links are ids into `nodes`.
/// Node ids are assigned monotonically and never reused, even after the
/// node is removed.
///
/// Cloning a tree deep-copies every plugin including its prepared state,
/// which is how each worker obtains an independent copy.
#[derive(Clone, Debug, Default)]
pub struct WorkflowTree {
    root: Option<NodeId>,
    nodes: BTreeMap<NodeId, TreeNode>,
    /// Registered ids in insertion order.
    node_ids: Vec<NodeId>,
    /// Smallest id that has never been assigned.
    next_id: NodeId,
    last_added: Option<NodeId>,
    prepared: bool,
}

impl WorkflowTree {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Registered ids in insertion order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn node(&self, node_id: NodeId) -> Result<&TreeNode> {
        self.nodes
            .get(&node_id)
            .ok_or(WorkflowError::UnknownNode(node_id))
    }

    /// Mutable access to a node.
    ///
    /// Parameters may change through this handle, so the tree must be
    /// prepared again before the next execution.
    pub fn node_mut(&mut self, node_id: NodeId) -> Result<&mut TreeNode> {
        self.prepared = false;
        self.nodes
            .get_mut(&node_id)
            .ok_or(WorkflowError::UnknownNode(node_id))
    }

    /// Whether `prepare_execution` ran since the last change.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Id the next automatically numbered node will receive.
    pub fn next_node_id(&self) -> NodeId {
        self.next_id
    }

    /// Add a plugin as a new node and return its id.
    ///
    /// The first node becomes the root whatever `parent` says. Otherwise the
    /// node is attached to `parent`, defaulting to the most recently added
    /// node still in the tree. An explicit `node_id` must be unused and
    /// greater than every registered id.
    pub fn create_and_add_node(
        &mut self,
        plugin: Box<dyn Plugin>,
        parent: Option<NodeId>,
        node_id: Option<NodeId>,
    ) -> Result<NodeId> {
        let node_id = match node_id {
            Some(id) => {
                if self.nodes.contains_key(&id) {
                    return Err(WorkflowError::config(format!(
                        "Node id {} is already in use",
                        id
                    )));
                }
                if let Some(max) = self.nodes.keys().next_back() {
                    if id <= *max {
                        return Err(WorkflowError::config(format!(
                            "Node id {} must be greater than every existing id (max {})",
                            id, max
                        )));
                    }
                }
                id
            }
            None => self.next_id,
        };

        let parent = if self.nodes.is_empty() {
            None
        } else {
            let parent = parent
                .or(self.last_added)
                .or_else(|| self.nodes.keys().next_back().copied())
                .ok_or_else(|| WorkflowError::config("No parent available for new node"))?;
            if !self.nodes.contains_key(&parent) {
                return Err(WorkflowError::UnknownNode(parent));
            }
            Some(parent)
        };

        let class_name = plugin.class_name();
        let node = TreeNode::new(node_id, parent, plugin);
        match parent {
            Some(parent_id) => {
                if let Some(p) = self.nodes.get_mut(&parent_id) {
                    p.add_child(node_id);
                }
            }
            None => self.root = Some(node_id),
        }

        self.nodes.insert(node_id, node);
        self.node_ids.push(node_id);
        self.next_id = self.next_id.max(node_id + 1);
        self.last_added = Some(node_id);
        self.prepared = false;

        tracing::debug!(node_id, ?parent, plugin = class_name, "Added workflow node");
        Ok(node_id)
    }

    /// Remove a node together with its subtree; returns the removed ids.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Vec<NodeId>> {
        let removed = topology::subtree_ids(self, node_id)?;
        let parent = self.node(node_id)?.parent();

        if let Some(parent_id) = parent {
            if let Some(p) = self.nodes.get_mut(&parent_id) {
                p.remove_child(node_id);
            }
        } else {
            self.root = None;
        }

        for id in &removed {
            self.nodes.remove(id);
        }
        self.node_ids.retain(|id| !removed.contains(id));
        if self.last_added.is_some_and(|id| removed.contains(&id)) {
            self.last_added = None;
        }
        self.prepared = false;

        tracing::debug!(node_id, removed = removed.len(), "Removed workflow subtree");
        Ok(removed)
    }

    /// Move a node (with its subtree) under a new parent.
    pub fn change_node_parent(&mut self, node_id: NodeId, new_parent: NodeId) -> Result<()> {
        let old_parent = self
            .node(node_id)?
            .parent()
            .ok_or_else(|| WorkflowError::config("The root node cannot be re-parented"))?;
        self.node(new_parent)?;

        if topology::subtree_ids(self, node_id)?.contains(&new_parent) {
            return Err(WorkflowError::config(format!(
                "Moving node {} under {} would create a cycle",
                node_id, new_parent
            )));
        }

        if let Some(p) = self.nodes.get_mut(&old_parent) {
            p.remove_child(node_id);
        }
        if let Some(p) = self.nodes.get_mut(&new_parent) {
            p.add_child(node_id);
        }
        if let Some(n) = self.nodes.get_mut(&node_id) {
            n.set_parent(Some(new_parent));
        }
        self.prepared = false;

        tracing::debug!(node_id, old_parent, new_parent, "Re-parented workflow node");
        Ok(())
    }

    /// Flag an interior node so its result is kept as well.
    pub fn set_node_retained(&mut self, node_id: NodeId, retain: bool) -> Result<()> {
        self.nodes
            .get_mut(&node_id)
            .ok_or(WorkflowError::UnknownNode(node_id))?
            .set_retain_result(retain);
        Ok(())
    }

    /// Ids of nodes whose results are kept, ascending.
    pub fn retained_node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.retains_result())
            .map(TreeNode::node_id)
            .collect()
    }

    /// Result shape of a node computed by the last preparation.
    pub fn result_shape(&self, node_id: NodeId) -> Result<Vec<usize>> {
        self.node(node_id)?
            .result_shape()
            .map(<[usize]>::to_vec)
            .ok_or_else(|| {
                WorkflowError::invalid_state(format!(
                    "Node {} has no result shape; call prepare_execution first",
                    node_id
                ))
            })
    }

    /// Remove every node. The id counter is kept so ids are not reused.
    pub fn clear(&mut self) {
        self.root = None;
        self.nodes.clear();
        self.node_ids.clear();
        self.last_added = None;
        self.prepared = false;
    }

    /// Check the structural invariants of the tree.
    pub fn validate_structure(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return if self.root.is_none() {
                Ok(())
            } else {
                Err(WorkflowError::config("Empty tree must not have a root"))
            };
        }

        let roots: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.is_root())
            .map(TreeNode::node_id)
            .collect();
        if roots.len() != 1 || self.root != roots.first().copied() {
            return Err(WorkflowError::config(format!(
                "Tree must have exactly one root, found {:?}",
                roots
            )));
        }

        for node in self.nodes.values() {
            for &child in node.children() {
                let child_parent = self.node(child)?.parent();
                if child_parent != Some(node.node_id()) {
                    return Err(WorkflowError::config(format!(
                        "Node {} lists child {} whose parent is {:?}",
                        node.node_id(),
                        child,
                        child_parent
                    )));
                }
            }
            if let Some(parent) = node.parent() {
                if !self.node(parent)?.children().contains(&node.node_id()) {
                    return Err(WorkflowError::config(format!(
                        "Node {} is missing from the children of its parent {}",
                        node.node_id(),
                        parent
                    )));
                }
            }
        }

        if topology::depth_first_order(self).len() != self.nodes.len() {
            return Err(WorkflowError::config(
                "Not every node is reachable from the root",
            ));
        }

        let mut ids = self.node_ids.clone();
        ids.sort_unstable();
        if !ids.iter().copied().eq(self.nodes.keys().copied()) {
            return Err(WorkflowError::config("Node id list is out of sync with the nodes"));
        }
        Ok(())
    }

    /// Build a tree from fully linked nodes, validating the structure.
    pub(crate) fn from_linked_nodes(nodes: Vec<TreeNode>) -> Result<Self> {
        let mut tree = Self::new();
        for node in nodes {
            let id = node.node_id();
            if node.is_root() {
                if let Some(existing) = tree.root {
                    return Err(WorkflowError::config(format!(
                        "Nodes {} and {} both have no parent",
                        existing, id
                    )));
                }
                tree.root = Some(id);
            }
            if tree.nodes.insert(id, node).is_some() {
                return Err(WorkflowError::config(format!("Duplicate node id {}", id)));
            }
            tree.node_ids.push(id);
            tree.next_id = tree.next_id.max(id + 1);
        }
        tree.last_added = tree.nodes.keys().next_back().copied();
        tree.validate_structure()?;
        Ok(tree)
    }

    /// Run `pre_execute` on every plugin and propagate result shapes from
    /// the root to the leaves.
    pub fn prepare_execution(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.prepared = false;
        let root = self
            .root
            .ok_or_else(|| WorkflowError::config("Cannot prepare an empty workflow tree"))?;
        let order = topology::depth_first_order(self);

        for &node_id in &order {
            let node = self
                .nodes
                .get_mut(&node_id)
                .ok_or(WorkflowError::UnknownNode(node_id))?;
            let plugin_type = node.plugin().plugin_type();
            match (node_id == root, plugin_type) {
                (true, PluginType::Input) | (false, PluginType::Processing | PluginType::Output) => {}
                (true, other) => {
                    return Err(WorkflowError::config(format!(
                        "Root node {} must hold an input plugin, found a {} plugin",
                        node_id,
                        other.name()
                    )));
                }
                (false, _) => {
                    return Err(WorkflowError::config(format!(
                        "Input plugin at node {} can only be used as the root",
                        node_id
                    )));
                }
            }
            node.plugin_mut().pre_execute(ctx)?;
        }

        for &node_id in &order {
            let input_shape = match self.node(node_id)?.parent() {
                Some(parent) => Some(self.result_shape(parent)?),
                None => None,
            };
            let node = self
                .nodes
                .get_mut(&node_id)
                .ok_or(WorkflowError::UnknownNode(node_id))?;
            node.propagate_shape(input_shape.as_deref())?;
            tracing::debug!(node_id, shape = ?node.result_shape(), "Propagated result shape");
        }

        self.prepared = true;
        tracing::info!(nodes = order.len(), "Workflow prepared for execution");
        Ok(())
    }

    /// Process one frame through the whole tree.
    ///
    /// Returns the result of every retained node. Any plugin error aborts
    /// the frame and is returned unchanged.
    pub fn execute_process(&mut self, frame_index: usize) -> Result<FrameResults> {
        if !self.prepared {
            return Err(WorkflowError::invalid_state(
                "prepare_execution must be called before execute_process",
            ));
        }
        let root = self
            .root
            .ok_or_else(|| WorkflowError::config("Cannot execute an empty workflow tree"))?;

        let mut kwargs = Kwargs::new();
        kwargs.insert(FRAME_INDEX_KEY.to_string(), ParamValue::Int(frame_index as i64));

        let mut results = FrameResults::new();
        self.execute_branch(root, PluginInput::Frame(frame_index), kwargs, &mut results)?;
        Ok(results)
    }

    /// Execute `node_id` and recurse into its children.
    ///
    /// Data is moved along single-child chains and cloned only where the
    /// tree branches, so plugins may mutate their input in place without
    /// affecting siblings.
    fn execute_branch(
        &mut self,
        node_id: NodeId,
        input: PluginInput,
        kwargs: Kwargs,
        results: &mut FrameResults,
    ) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(WorkflowError::UnknownNode(node_id))?;
        let (output, kwargs) = node.execute_plugin(input, kwargs)?;
        let retain = node.retains_result();
        let children = node.children().to_vec();

        let Some((&last, rest)) = children.split_last() else {
            results.insert(node_id, output);
            return Ok(());
        };

        if retain {
            results.insert(node_id, output.clone());
        }
        for &child in rest {
            self.execute_branch(child, PluginInput::Data(output.clone()), kwargs.clone(), results)?;
        }
        self.execute_branch(last, PluginInput::Data(output), kwargs, results)
    }

    /// Run one node's plugin on caller-supplied input.
    ///
    /// Calls `pre_execute` first; intended for inspecting a single step.
    pub fn execute_single_plugin(
        &mut self,
        node_id: NodeId,
        input: PluginInput,
        kwargs: Kwargs,
        ctx: &ExecutionContext,
    ) -> Result<(Dataset, Kwargs)> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(WorkflowError::UnknownNode(node_id))?;
        node.plugin_mut().pre_execute(ctx)?;
        node.execute_plugin(input, kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GeneratedFrames;
    use crate::plugin::builtin::{Crop, FrameLoader, ScaleOffset, SumFrame};
    use crate::scan::ScanGeometry;
    use std::sync::Arc;

    fn context(n_points: usize, frame_shape: &[usize]) -> ExecutionContext {
        ExecutionContext::new(ScanGeometry::from_shape(&[n_points]).unwrap()).with_frame_source(
            Arc::new(GeneratedFrames::frame_index_filled(n_points, frame_shape)),
        )
    }

    fn scale(offset: f64) -> Box<dyn Plugin> {
        Box::new(ScaleOffset::with_values(1.0, offset).unwrap())
    }

    #[test]
    fn test_first_node_becomes_root() {
        let mut tree = WorkflowTree::new();
        let root = tree
            .create_and_add_node(Box::new(FrameLoader::new()), Some(42), None)
            .unwrap();
        assert_eq!(root, 0);
        assert_eq!(tree.root(), Some(0));
        assert!(tree.node(0).unwrap().is_root());
    }

    #[test]
    fn test_default_parent_is_last_added() {
        let mut tree = WorkflowTree::new();
        let a = tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let b = tree.create_and_add_node(scale(0.0), None, None).unwrap();
        let c = tree.create_and_add_node(scale(0.0), None, None).unwrap();
        let d = tree.create_and_add_node(scale(0.0), Some(a), None).unwrap();

        assert_eq!(tree.node(b).unwrap().parent(), Some(a));
        assert_eq!(tree.node(c).unwrap().parent(), Some(b));
        assert_eq!(tree.node(a).unwrap().children(), &[b, d]);
        tree.validate_structure().unwrap();
    }

    #[test]
    fn test_explicit_ids_must_increase() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, Some(5)).unwrap();

        let dup = tree.create_and_add_node(scale(0.0), None, Some(5));
        assert!(matches!(dup, Err(WorkflowError::Config(_))));
        let lower = tree.create_and_add_node(scale(0.0), None, Some(3));
        assert!(matches!(lower, Err(WorkflowError::Config(_))));

        assert_eq!(tree.create_and_add_node(scale(0.0), None, None).unwrap(), 6);
        assert_eq!(tree.create_and_add_node(scale(0.0), None, Some(10)).unwrap(), 10);
        assert_eq!(tree.create_and_add_node(scale(0.0), None, None).unwrap(), 11);
    }

    #[test]
    fn test_unknown_parent() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        assert!(matches!(
            tree.create_and_add_node(scale(0.0), Some(7), None),
            Err(WorkflowError::UnknownNode(7))
        ));
    }

    #[test]
    fn test_remove_subtree_and_ids_not_reused() {
        let mut tree = WorkflowTree::new();
        let root = tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let a = tree.create_and_add_node(scale(0.0), None, None).unwrap();
        let b = tree.create_and_add_node(scale(0.0), None, None).unwrap();

        let mut removed = tree.remove_node(a).unwrap();
        removed.sort_unstable();
        assert_eq!(removed, vec![a, b]);
        assert_eq!(tree.node_ids(), &[root]);
        assert!(tree.node(root).unwrap().is_leaf());

        let c = tree.create_and_add_node(scale(0.0), None, None).unwrap();
        assert_eq!(c, 3);
        assert_eq!(tree.node(c).unwrap().parent(), Some(root));
        tree.validate_structure().unwrap();

        tree.remove_node(root).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(
            tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap(),
            4
        );
    }

    #[test]
    fn test_change_parent_rejects_cycles() {
        let mut tree = WorkflowTree::new();
        let root = tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let a = tree.create_and_add_node(scale(0.0), None, None).unwrap();
        let b = tree.create_and_add_node(scale(0.0), None, None).unwrap();
        let c = tree.create_and_add_node(scale(0.0), Some(root), None).unwrap();

        assert!(tree.change_node_parent(a, b).is_err());
        assert!(tree.change_node_parent(root, c).is_err());

        tree.change_node_parent(b, c).unwrap();
        assert_eq!(tree.node(b).unwrap().parent(), Some(c));
        assert!(tree.node(a).unwrap().is_leaf());
        tree.validate_structure().unwrap();
    }

    #[test]
    fn test_prepare_propagates_shapes() {
        let mut tree = WorkflowTree::new();
        let root = tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let mut crop = Crop::new();
        crop.set_param("roi", ParamValue::IntList(vec![0, 2, 1, 4])).unwrap();
        let crop_id = tree.create_and_add_node(Box::new(crop), None, None).unwrap();
        let sum_id = tree.create_and_add_node(Box::new(SumFrame::new()), None, None).unwrap();

        tree.prepare_execution(&context(3, &[4, 5])).unwrap();
        assert_eq!(tree.result_shape(root).unwrap(), vec![4, 5]);
        assert_eq!(tree.result_shape(crop_id).unwrap(), vec![2, 3]);
        assert_eq!(tree.result_shape(sum_id).unwrap(), vec![1]);
    }

    #[test]
    fn test_prepare_fails_on_bad_parameters() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let mut crop = Crop::new();
        crop.set_param("roi", ParamValue::IntList(vec![0, 10, 0, 0])).unwrap();
        tree.create_and_add_node(Box::new(crop), None, None).unwrap();

        let result = tree.prepare_execution(&context(3, &[4, 5]));
        assert!(matches!(result, Err(WorkflowError::Config(_))));
        assert!(!tree.is_prepared());
    }

    #[test]
    fn test_prepare_checks_plugin_roles() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(scale(0.0), None, None).unwrap();
        assert!(tree.prepare_execution(&context(2, &[2])).is_err());

        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        assert!(tree.prepare_execution(&context(2, &[2])).is_err());

        assert!(WorkflowTree::new().prepare_execution(&context(2, &[2])).is_err());
    }

    #[test]
    fn test_execute_requires_preparation() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        assert!(matches!(
            tree.execute_process(0),
            Err(WorkflowError::InvalidState(_))
        ));
    }

    #[test]
    fn test_execute_collects_leaves_and_flagged_nodes() {
        let mut tree = WorkflowTree::new();
        let root = tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let mid = tree.create_and_add_node(scale(1.0), None, None).unwrap();
        let leaf = tree.create_and_add_node(Box::new(SumFrame::new()), None, None).unwrap();
        tree.set_node_retained(mid, true).unwrap();
        tree.prepare_execution(&context(4, &[2, 2])).unwrap();

        let results = tree.execute_process(3).unwrap();
        assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![mid, leaf]);
        assert!(!results.contains_key(&root));
        assert!(results[&mid].array().iter().all(|&v| v == 4.0));
        assert_eq!(results[&leaf].array()[[0]], 16.0);
    }

    #[test]
    fn test_siblings_do_not_see_each_other() {
        let mut tree = WorkflowTree::new();
        let root = tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let left = tree.create_and_add_node(scale(100.0), Some(root), None).unwrap();
        let right = tree.create_and_add_node(scale(1000.0), Some(root), None).unwrap();
        tree.prepare_execution(&context(3, &[3])).unwrap();

        let results = tree.execute_process(2).unwrap();
        assert!(results[&left].array().iter().all(|&v| v == 102.0));
        assert!(results[&right].array().iter().all(|&v| v == 1002.0));
    }

    #[test]
    fn test_plugin_error_aborts_frame() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        tree.prepare_execution(&context(2, &[2])).unwrap();

        // Frame 5 is beyond the generated source.
        let err = tree.execute_process(5).unwrap_err();
        assert!(err.is_execution());
    }

    #[test]
    fn test_execute_single_plugin() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let node = tree.create_and_add_node(scale(2.0), None, None).unwrap();
        let ctx = context(2, &[2]);

        let input = PluginInput::Data(Dataset::zeros(&[3]));
        let (out, _) = tree.execute_single_plugin(node, input, Kwargs::new(), &ctx).unwrap();
        assert!(out.array().iter().all(|&v| v == 2.0));

        assert!(matches!(
            tree.execute_single_plugin(99, PluginInput::Frame(0), Kwargs::new(), &ctx),
            Err(WorkflowError::UnknownNode(99))
        ));
    }

    #[test]
    fn test_node_mut_invalidates_preparation() {
        let mut tree = WorkflowTree::new();
        let root = tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        tree.prepare_execution(&context(2, &[2])).unwrap();
        assert!(tree.is_prepared());

        tree.node_mut(root)
            .unwrap()
            .plugin_mut()
            .set_param("frame_offset", ParamValue::Int(0))
            .unwrap();
        assert!(!tree.is_prepared());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let node = tree.create_and_add_node(scale(1.0), None, None).unwrap();
        tree.prepare_execution(&context(2, &[2])).unwrap();

        let mut copy = tree.clone();
        copy.node_mut(node)
            .unwrap()
            .plugin_mut()
            .set_param("offset", ParamValue::Float(50.0))
            .unwrap();
        copy.prepare_execution(&context(2, &[2])).unwrap();

        assert_eq!(tree.execute_process(1).unwrap()[&node].array()[[0]], 2.0);
        assert_eq!(copy.execute_process(1).unwrap()[&node].array()[[0]], 51.0);
    }
}
