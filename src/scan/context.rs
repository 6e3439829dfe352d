//! Context handed to plugins during preparation.

use super::ScanGeometry;
use crate::data::FrameSource;
use std::fmt;
use std::sync::Arc;

/// Per-run configuration threaded through preparation and single-plugin
/// execution.
///
/// Each run constructs its own context; workers share the frame source by
/// `Arc` but nothing else.
#[derive(Clone)]
pub struct ExecutionContext {
    scan: ScanGeometry,
    frames: Option<Arc<dyn FrameSource>>,
}

impl ExecutionContext {
    pub fn new(scan: ScanGeometry) -> Self {
        Self { scan, frames: None }
    }

    /// Attach the frame source read by input plugins.
    pub fn with_frame_source(mut self, frames: Arc<dyn FrameSource>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn scan(&self) -> &ScanGeometry {
        &self.scan
    }

    pub fn frame_source(&self) -> Option<&Arc<dyn FrameSource>> {
        self.frames.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("scan", &self.scan)
            .field("has_frame_source", &self.frames.is_some())
            .finish()
    }
}
