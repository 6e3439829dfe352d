//! Error types for workflow construction, execution and result aggregation.

use crate::tree::NodeId;
use thiserror::Error;

/// Result type alias using [`WorkflowError`].
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised by the workflow engine.
///
/// All errors are returned synchronously from the call that detects them.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Structural or parameter misconfiguration (invalid node id, unknown
    /// plugin class, unresolvable result shape, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A plugin failed while processing a frame.
    #[error("Plugin '{plugin}' failed: {message}")]
    Execution { plugin: String, message: String },

    /// A plugin produced a result whose shape differs from the propagated one.
    #[error("Shape mismatch for node {node_id}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        node_id: NodeId,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Frame index or scan position outside the scan.
    #[error("Frame index {index} out of range for a scan of {n_total} points")]
    IndexRange { index: usize, n_total: usize },

    /// Node id not registered in the tree.
    #[error("Node {0} is not registered in the workflow tree")]
    UnknownNode(NodeId),

    /// Operation not valid in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Worker pool or task join failure.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// YAML (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an execution error attributed to a plugin.
    pub fn execution(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-state error with a message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Whether this error came from a plugin's `execute`.
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}
