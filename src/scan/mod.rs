//! Scan geometry and the per-run execution context.

pub mod context;
pub mod geometry;

pub use context::ExecutionContext;
pub use geometry::{ScanAxis, ScanGeometry, MAX_SCAN_DIM};
