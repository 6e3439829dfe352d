//! Policies for frames whose processing fails.

use crate::error::WorkflowError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the runner does after a frame fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    /// Leave the frame's slots untouched and continue.
    Skip,
    /// Stop dispatching and return the error.
    Abort,
}

/// Policy for deciding how to react to a failed frame.
pub trait FrameErrorPolicy: Send + Sync {
    fn on_error(&self, frame_index: usize, error: &WorkflowError) -> FrameAction;

    /// Reset the policy state (for reuse).
    fn reset(&self) {}
}

/// Abort on the first failure.
#[derive(Debug, Default)]
pub struct AbortOnError;

impl FrameErrorPolicy for AbortOnError {
    fn on_error(&self, _frame_index: usize, _error: &WorkflowError) -> FrameAction {
        FrameAction::Abort
    }
}

/// Skip plugin failures; abort on anything else.
///
/// Shape mismatches and configuration errors affect every frame, so they
/// still stop the run.
#[derive(Debug, Default)]
pub struct SkipFailedFrames;

impl FrameErrorPolicy for SkipFailedFrames {
    fn on_error(&self, _frame_index: usize, error: &WorkflowError) -> FrameAction {
        if error.is_execution() {
            FrameAction::Skip
        } else {
            FrameAction::Abort
        }
    }
}

/// Skip plugin failures up to a limit.
pub struct MaxFailuresPolicy {
    max_failures: usize,
    failures: AtomicUsize,
}

impl MaxFailuresPolicy {
    pub fn new(max_failures: usize) -> Self {
        Self {
            max_failures,
            failures: AtomicUsize::new(0),
        }
    }

    /// Failures counted so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl FrameErrorPolicy for MaxFailuresPolicy {
    fn on_error(&self, _frame_index: usize, error: &WorkflowError) -> FrameAction {
        if !error.is_execution() {
            return FrameAction::Abort;
        }
        let previous = self.failures.fetch_add(1, Ordering::SeqCst);
        if previous < self.max_failures {
            FrameAction::Skip
        } else {
            FrameAction::Abort
        }
    }

    fn reset(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }
}
