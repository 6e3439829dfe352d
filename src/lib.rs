//! xrdflow - workflow execution engine for X-ray diffraction scans.
//!
//! This crate runs a user-configured tree of processing plugins over every
//! detector frame of a scan and aggregates the per-frame results into
//! scan-shaped arrays:
//!
//! - Tree of plugins with result-shape propagation before execution
//! - Copy-on-branch execution so plugins may work in place
//! - Scan-indexed composite arrays with axis metadata
//! - Serial, rayon-parallel and tokio-driven scan runners
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   ProcessingConfig (YAML)           │
//! │   ScanGeometry + RunnerConfig       │
//! └─────────────────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────┐
//! │            ScanRunner               │
//! │  ┌───────────┐  ┌───────────────┐  │
//! │  │  Frame    │  │ Worker copies │  │
//! │  │ Scheduler │  │ of the tree   │  │
//! │  └───────────┘  └───────────────┘  │
//! │         │   (frame, results)        │
//! │         ▼                           │
//! │  ┌─────────────────────────────┐   │
//! │  │ WorkflowResults (composites)│   │
//! │  └─────────────────────────────┘   │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use xrdflow::plugin::builtin::{FrameLoader, SumFrame};
//! use xrdflow::{ExecutionContext, GeneratedFrames, ScanGeometry, WorkflowResults, WorkflowTree};
//!
//! let scan = ScanGeometry::from_shape(&[5]).unwrap();
//! let ctx = ExecutionContext::new(scan.clone())
//!     .with_frame_source(Arc::new(GeneratedFrames::frame_index_filled(5, &[3])));
//!
//! let mut tree = WorkflowTree::new();
//! tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
//! let sum = tree.create_and_add_node(Box::new(SumFrame::new()), None, None).unwrap();
//! tree.prepare_execution(&ctx).unwrap();
//!
//! let mut results = WorkflowResults::new();
//! results.update_shapes_from_scan_and_workflow(&scan, &tree).unwrap();
//! for frame in 0..scan.n_total() {
//!     let frame_results = tree.execute_process(frame).unwrap();
//!     results.store_results(frame, &frame_results).unwrap();
//! }
//! assert_eq!(results.get_results(sum).unwrap().shape(), &[5, 1]);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod plugin;
pub mod results;
pub mod runtime;
pub mod scan;
pub mod tree;

// Re-export commonly used items
pub use config::{ErrorPolicyConfig, ProcessingConfig, RunnerConfig};
pub use data::{AxisMetadata, Dataset, FrameSource, GeneratedFrames, InMemoryFrames};
pub use error::{Result, WorkflowError};
pub use plugin::{Kwargs, ParamValue, Plugin, PluginInput, PluginRegistry, PluginType};
pub use results::{ResultMetadata, ResultsState, WorkflowResults};
pub use runtime::{FrameErrorPolicy, FrameScheduler, RunSummary, ScanRunner};
pub use scan::{ExecutionContext, ScanAxis, ScanGeometry};
pub use tree::{FrameResults, NodeId, TreeNode, WorkflowTree};
