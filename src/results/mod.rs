//! Aggregation of per-frame results into scan-shaped composite arrays.

pub mod workflow_results;

pub use workflow_results::{ResultMetadata, ResultsState, WorkflowResults};
