//! A single node of the workflow tree.

use super::NodeId;
use crate::data::Dataset;
use crate::error::Result;
use crate::plugin::{Kwargs, Plugin, PluginInput};

/// One plugin together with its position in the tree.
///
/// Parent and children are stored as ids; the owning
/// [`WorkflowTree`](super::WorkflowTree) resolves them.
#[derive(Clone, Debug)]
pub struct TreeNode {
    node_id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    plugin: Box<dyn Plugin>,
    retain_result: bool,
}

impl TreeNode {
    pub(crate) fn new(node_id: NodeId, parent: Option<NodeId>, plugin: Box<dyn Plugin>) -> Self {
        Self {
            node_id,
            parent,
            children: Vec::new(),
            plugin,
            retain_result: false,
        }
    }

    #[inline]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn plugin_mut(&mut self) -> &mut dyn Plugin {
        self.plugin.as_mut()
    }

    /// Whether the node was explicitly flagged for retention.
    pub fn is_flagged_for_retention(&self) -> bool {
        self.retain_result
    }

    /// Leaves are always retained; interior nodes only when flagged.
    pub fn retains_result(&self) -> bool {
        self.retain_result || self.is_leaf()
    }

    pub fn result_shape(&self) -> Option<&[usize]> {
        self.plugin.result_shape()
    }

    pub(crate) fn set_retain_result(&mut self, retain: bool) {
        self.retain_result = retain;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub(crate) fn add_child(&mut self, child: NodeId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, child: NodeId) {
        self.children.retain(|&c| c != child);
    }

    pub(crate) fn set_children(&mut self, children: Vec<NodeId>) {
        self.children = children;
    }

    /// Run the plugin on one input.
    pub(crate) fn execute_plugin(
        &mut self,
        input: PluginInput,
        kwargs: Kwargs,
    ) -> Result<(Dataset, Kwargs)> {
        self.plugin.execute(input, kwargs)
    }

    /// Propagate the parent's result shape into the plugin and compute ours.
    pub(crate) fn propagate_shape(&mut self, input_shape: Option<&[usize]>) -> Result<()> {
        if let Some(shape) = input_shape {
            self.plugin.set_input_shape(shape);
        }
        self.plugin.calculate_result_shape()
    }
}
