//! Workflow tree: plugin nodes, structural edits, execution and persistence.

pub mod node;
pub mod serialize;
pub mod topology;
pub mod workflow;

/// Identifier of a tree node. Unique for the lifetime of a tree.
pub type NodeId = usize;

pub use node::TreeNode;
pub use serialize::NodeRecord;
pub use topology::NodePosition;
pub use workflow::{FrameResults, WorkflowTree};
