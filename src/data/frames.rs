//! Frame sources consumed by input plugins.
//!
//! Detector file readers live outside this crate; they plug in through the
//! [`FrameSource`] trait.

use crate::error::{Result, WorkflowError};
use ndarray::{ArrayD, IxDyn};
use std::fmt;

/// Random-access provider of raw detector frames.
pub trait FrameSource: Send + Sync {
    /// Number of frames available.
    fn n_frames(&self) -> usize;

    /// Shape shared by every frame.
    fn frame_shape(&self) -> Vec<usize>;

    /// Read one frame.
    fn read_frame(&self, index: usize) -> Result<ArrayD<f64>>;
}

/// Frames held in memory.
#[derive(Clone, Debug)]
pub struct InMemoryFrames {
    frames: Vec<ArrayD<f64>>,
    shape: Vec<usize>,
}

impl InMemoryFrames {
    /// Create from a list of equally shaped frames.
    pub fn new(frames: Vec<ArrayD<f64>>) -> Result<Self> {
        let shape = frames
            .first()
            .map(|f| f.shape().to_vec())
            .ok_or_else(|| WorkflowError::config("A frame source needs at least one frame"))?;

        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.shape() != shape.as_slice())
        {
            return Err(WorkflowError::config(format!(
                "Frame {} has shape {:?}, expected {:?}",
                index,
                frame.shape(),
                shape
            )));
        }

        Ok(Self { frames, shape })
    }
}

impl FrameSource for InMemoryFrames {
    fn n_frames(&self) -> usize {
        self.frames.len()
    }

    fn frame_shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn read_frame(&self, index: usize) -> Result<ArrayD<f64>> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(WorkflowError::IndexRange {
                index,
                n_total: self.frames.len(),
            })
    }
}

type FrameFn = dyn Fn(usize, &mut ArrayD<f64>) + Send + Sync;

/// Frames computed on demand by a closure.
///
/// The closure fills a zeroed array of `shape` for each requested index.
pub struct GeneratedFrames {
    n_frames: usize,
    shape: Vec<usize>,
    generator: Box<FrameFn>,
}

impl GeneratedFrames {
    pub fn new<F>(n_frames: usize, shape: &[usize], generator: F) -> Self
    where
        F: Fn(usize, &mut ArrayD<f64>) + Send + Sync + 'static,
    {
        Self {
            n_frames,
            shape: shape.to_vec(),
            generator: Box::new(generator),
        }
    }

    /// Frames whose every pixel equals the frame index.
    pub fn frame_index_filled(n_frames: usize, shape: &[usize]) -> Self {
        Self::new(n_frames, shape, |index, frame| frame.fill(index as f64))
    }
}

impl fmt::Debug for GeneratedFrames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedFrames")
            .field("n_frames", &self.n_frames)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl FrameSource for GeneratedFrames {
    fn n_frames(&self) -> usize {
        self.n_frames
    }

    fn frame_shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn read_frame(&self, index: usize) -> Result<ArrayD<f64>> {
        if index >= self.n_frames {
            return Err(WorkflowError::IndexRange {
                index,
                n_total: self.n_frames,
            });
        }
        let mut frame = ArrayD::zeros(IxDyn(&self.shape));
        (self.generator)(index, &mut frame);
        Ok(frame)
    }
}
