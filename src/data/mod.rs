//! Data structures flowing through a workflow.

pub mod dataset;
pub mod frames;
pub mod peak;

pub use dataset::{AxisMetadata, Dataset};
pub use frames::{FrameSource, GeneratedFrames, InMemoryFrames};
pub use peak::{estimate_gaussian, find_peaks, highest_peak, prominence, GaussianEstimate, Peak};
