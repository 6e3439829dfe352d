//! Scan orchestration: frame scheduling, failure policies and runners.

pub mod executor;
pub mod policy;
pub mod scheduler;

pub use executor::{RunSummary, ScanRunner};
pub use policy::{AbortOnError, FrameAction, FrameErrorPolicy, MaxFailuresPolicy, SkipFailedFrames};
pub use scheduler::{FrameScheduler, FrameTask};
