//! Scan geometry: the N-dimensional grid of scan positions.

use crate::data::AxisMetadata;
use crate::error::{Result, WorkflowError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Maximum number of scan dimensions.
pub const MAX_SCAN_DIM: usize = 4;

/// One scan dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanAxis {
    /// Axis label, e.g. "x" or "rotation".
    #[serde(default)]
    pub label: String,
    /// Unit of the positions.
    #[serde(default)]
    pub unit: String,
    /// Number of points along this axis.
    pub n_points: usize,
    /// Step between consecutive points.
    #[serde(default = "default_delta")]
    pub delta: f64,
    /// Position of the first point.
    #[serde(default)]
    pub offset: f64,
}

fn default_delta() -> f64 {
    1.0
}

impl ScanAxis {
    pub fn new(label: impl Into<String>, unit: impl Into<String>, n_points: usize) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
            n_points,
            delta: 1.0,
            offset: 0.0,
        }
    }

    /// Set step and offset.
    pub fn with_steps(mut self, delta: f64, offset: f64) -> Self {
        self.delta = delta;
        self.offset = offset;
        self
    }

    /// Positions `offset + i * delta` for every point.
    pub fn range(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n_points).map(|i| self.offset + i as f64 * self.delta))
    }

    pub fn metadata(&self) -> AxisMetadata {
        AxisMetadata::new(self.label.clone(), self.unit.clone()).with_range(self.range())
    }
}

/// Validated scan geometry with 1 to 4 dimensions.
///
/// Frame indices map to scan positions in row-major order: the last axis
/// varies fastest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ScanAxis>", into = "Vec<ScanAxis>")]
pub struct ScanGeometry {
    axes: Vec<ScanAxis>,
}

impl ScanGeometry {
    /// Create a geometry, validating dimension count and point numbers.
    pub fn new(axes: Vec<ScanAxis>) -> Result<Self> {
        if axes.is_empty() || axes.len() > MAX_SCAN_DIM {
            return Err(WorkflowError::config(format!(
                "Scan must have between 1 and {} dimensions, got {}",
                MAX_SCAN_DIM,
                axes.len()
            )));
        }
        if let Some((dim, _)) = axes.iter().enumerate().find(|(_, a)| a.n_points == 0) {
            return Err(WorkflowError::config(format!(
                "Scan dimension {} has no points",
                dim
            )));
        }
        Ok(Self { axes })
    }

    /// Geometry from point counts only, with index positions.
    pub fn from_shape(shape: &[usize]) -> Result<Self> {
        Self::new(
            shape
                .iter()
                .enumerate()
                .map(|(dim, &n)| ScanAxis::new(format!("scan axis {}", dim), "", n))
                .collect(),
        )
    }

    pub fn scan_dim(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[ScanAxis] {
        &self.axes
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.n_points).collect()
    }

    /// Total number of scan points.
    pub fn n_total(&self) -> usize {
        self.axes.iter().map(|a| a.n_points).product()
    }

    /// Scan position of a linear frame index.
    pub fn frame_to_position(&self, frame_index: usize) -> Result<Vec<usize>> {
        let n_total = self.n_total();
        if frame_index >= n_total {
            return Err(WorkflowError::IndexRange {
                index: frame_index,
                n_total,
            });
        }

        let mut position = vec![0; self.axes.len()];
        let mut remainder = frame_index;
        for (slot, axis) in position.iter_mut().zip(&self.axes).rev() {
            *slot = remainder % axis.n_points;
            remainder /= axis.n_points;
        }
        Ok(position)
    }

    /// Linear frame index of a scan position.
    pub fn position_to_frame(&self, position: &[usize]) -> Result<usize> {
        if position.len() != self.axes.len() {
            return Err(WorkflowError::config(format!(
                "Scan position {:?} does not match a {}-dimensional scan",
                position,
                self.axes.len()
            )));
        }

        let mut frame_index = 0;
        for (&p, axis) in position.iter().zip(&self.axes) {
            if p >= axis.n_points {
                return Err(WorkflowError::IndexRange {
                    index: p,
                    n_total: axis.n_points,
                });
            }
            frame_index = frame_index * axis.n_points + p;
        }
        Ok(frame_index)
    }

    /// Label, unit and positions for every scan dimension.
    pub fn axis_metadata(&self) -> Vec<AxisMetadata> {
        self.axes.iter().map(ScanAxis::metadata).collect()
    }
}

impl TryFrom<Vec<ScanAxis>> for ScanGeometry {
    type Error = WorkflowError;

    fn try_from(axes: Vec<ScanAxis>) -> Result<Self> {
        Self::new(axes)
    }
}

impl From<ScanGeometry> for Vec<ScanAxis> {
    fn from(scan: ScanGeometry) -> Self {
        scan.axes
    }
}
