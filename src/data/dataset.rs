//! N-dimensional data with per-axis metadata.

use crate::error::{Result, WorkflowError};
use ndarray::{Array1, ArrayD, ArrayViewD, ArrayViewMutD, IxDyn};

/// Label, unit and coordinate range of one array axis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisMetadata {
    /// Axis label, e.g. "2theta" or "scan position x".
    pub label: String,
    /// Physical unit of the axis coordinates.
    pub unit: String,
    /// Coordinate value for every index along the axis, if known.
    pub range: Option<Array1<f64>>,
}

impl AxisMetadata {
    /// Create axis metadata without a coordinate range.
    pub fn new(label: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
            range: None,
        }
    }

    /// Attach a coordinate range.
    pub fn with_range(mut self, range: Array1<f64>) -> Self {
        self.range = Some(range);
        self
    }

    /// Plain index axis `0..len`.
    pub fn index(len: usize) -> Self {
        Self {
            label: "index".to_string(),
            unit: String::new(),
            range: Some(Array1::range(0.0, len as f64, 1.0)),
        }
    }

    /// Coordinates of this axis, falling back to indices for `len` points.
    pub fn range_or_index(&self, len: usize) -> Array1<f64> {
        match &self.range {
            Some(range) if range.len() == len => range.clone(),
            _ => Array1::range(0.0, len as f64, 1.0),
        }
    }
}

/// An array of `f64` values with axis metadata.
///
/// Plugins consume and produce datasets; composite result arrays are
/// datasets as well.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    array: ArrayD<f64>,
    axes: Vec<AxisMetadata>,
    data_label: String,
    data_unit: String,
}

impl Dataset {
    /// Wrap an array with empty axis metadata.
    pub fn new(array: ArrayD<f64>) -> Self {
        let axes = vec![AxisMetadata::default(); array.ndim()];
        Self {
            array,
            axes,
            data_label: String::new(),
            data_unit: String::new(),
        }
    }

    /// Zero-filled dataset of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::new(ArrayD::zeros(IxDyn(shape)))
    }

    /// Wrap an array together with metadata for every axis.
    pub fn with_axes(array: ArrayD<f64>, axes: Vec<AxisMetadata>) -> Result<Self> {
        if axes.len() != array.ndim() {
            return Err(WorkflowError::config(format!(
                "Dataset with {} dimensions cannot carry metadata for {} axes",
                array.ndim(),
                axes.len()
            )));
        }
        Ok(Self {
            array,
            axes,
            data_label: String::new(),
            data_unit: String::new(),
        })
    }

    /// Set the label and unit of the data values.
    pub fn with_data_label(mut self, label: impl Into<String>, unit: impl Into<String>) -> Self {
        self.data_label = label.into();
        self.data_unit = unit.into();
        self
    }

    pub fn set_data_label(&mut self, label: impl Into<String>, unit: impl Into<String>) {
        self.data_label = label.into();
        self.data_unit = unit.into();
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.array.ndim()
    }

    #[inline]
    pub fn array(&self) -> &ArrayD<f64> {
        &self.array
    }

    #[inline]
    pub fn array_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.array
    }

    #[inline]
    pub fn view(&self) -> ArrayViewD<'_, f64> {
        self.array.view()
    }

    #[inline]
    pub fn view_mut(&mut self) -> ArrayViewMutD<'_, f64> {
        self.array.view_mut()
    }

    /// Consume the dataset and return the raw array.
    pub fn into_array(self) -> ArrayD<f64> {
        self.array
    }

    pub fn axes(&self) -> &[AxisMetadata] {
        &self.axes
    }

    pub fn axis(&self, index: usize) -> Option<&AxisMetadata> {
        self.axes.get(index)
    }

    /// Replace the metadata of one axis.
    pub fn set_axis(&mut self, index: usize, axis: AxisMetadata) -> Result<()> {
        let ndim = self.ndim();
        let slot = self.axes.get_mut(index).ok_or_else(|| {
            WorkflowError::config(format!(
                "Axis {} does not exist in a {}-dimensional dataset",
                index, ndim
            ))
        })?;
        *slot = axis;
        Ok(())
    }

    pub fn data_label(&self) -> &str {
        &self.data_label
    }

    pub fn data_unit(&self) -> &str {
        &self.data_unit
    }

    /// Coordinates of an axis, falling back to plain indices.
    pub fn axis_coordinates(&self, index: usize) -> Array1<f64> {
        let len = self.shape().get(index).copied().unwrap_or(0);
        match self.axes.get(index) {
            Some(axis) => axis.range_or_index(len),
            None => Array1::range(0.0, len as f64, 1.0),
        }
    }
}

impl From<ArrayD<f64>> for Dataset {
    fn from(array: ArrayD<f64>) -> Self {
        Self::new(array)
    }
}
