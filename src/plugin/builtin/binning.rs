//! Block averaging over every axis.

use crate::data::{AxisMetadata, Dataset};
use crate::error::{Result, WorkflowError};
use crate::plugin::params::{ParamValue, Parameter, ParameterCollection};
use crate::plugin::traits::{Kwargs, Plugin, PluginInput, PluginType, ShapeState};
use ndarray::{Array1, ArrayD, Axis, IxDyn};

/// Averages `bin_size` consecutive points along every axis.
///
/// Trailing points that do not fill a complete bin are dropped.
#[derive(Clone)]
pub struct Binning {
    params: ParameterCollection,
    shapes: ShapeState,
}

impl Binning {
    pub const CLASS_NAME: &'static str = "Binning";

    pub fn new() -> Self {
        Self {
            params: ParameterCollection::new()
                .with(Parameter::new("bin_size", ParamValue::Int(2)).with_unit("points")),
            shapes: ShapeState::default(),
        }
    }

    fn bin_size(&self) -> Result<usize> {
        let bin = self.params.get_usize("bin_size")?;
        if bin == 0 {
            return Err(WorkflowError::config("Binning bin_size must be at least 1"));
        }
        Ok(bin)
    }

    fn binned_shape(shape: &[usize], bin: usize) -> Result<Vec<usize>> {
        let binned: Vec<usize> = shape.iter().map(|&n| n / bin).collect();
        if binned.iter().any(|&n| n == 0) {
            return Err(WorkflowError::config(format!(
                "Binning by {} empties input shape {:?}",
                bin, shape
            )));
        }
        Ok(binned)
    }
}

/// Mean over consecutive blocks of `bin` points along `axis`.
fn bin_axis(array: &ArrayD<f64>, axis: usize, bin: usize) -> ArrayD<f64> {
    let n_out = array.shape()[axis] / bin;
    let mut shape = array.shape().to_vec();
    shape[axis] = n_out;

    let mut out = ArrayD::zeros(IxDyn(&shape));
    for (i, mut lane) in out.axis_iter_mut(Axis(axis)).enumerate() {
        for j in 0..bin {
            lane += &array.index_axis(Axis(axis), i * bin + j);
        }
        lane /= bin as f64;
    }
    out
}

fn bin_range(range: &Array1<f64>, bin: usize) -> Array1<f64> {
    Array1::from_iter(
        range
            .as_slice()
            .unwrap_or(&[])
            .chunks_exact(bin)
            .map(|chunk| chunk.iter().sum::<f64>() / bin as f64),
    )
}

impl Default for Binning {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Binning {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Processing
    }

    fn params(&self) -> &ParameterCollection {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParameterCollection {
        &mut self.params
    }

    fn shapes(&self) -> &ShapeState {
        &self.shapes
    }

    fn shapes_mut(&mut self) -> &mut ShapeState {
        &mut self.shapes
    }

    fn compute_result_shape(&self, input_shape: Option<&[usize]>) -> Result<Vec<usize>> {
        let input = input_shape
            .ok_or_else(|| WorkflowError::config("Binning needs a propagated input shape"))?;
        Self::binned_shape(input, self.bin_size()?)
    }

    fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
        let data = input.into_dataset(Self::CLASS_NAME)?;
        let bin = self.bin_size()?;
        if bin == 1 {
            return Ok((data, kwargs));
        }
        Self::binned_shape(data.shape(), bin)
            .map_err(|e| WorkflowError::execution(Self::CLASS_NAME, e.to_string()))?;

        let mut binned = data.array().clone();
        for axis in 0..binned.ndim() {
            binned = bin_axis(&binned, axis, bin);
        }

        let axes = data
            .axes()
            .iter()
            .map(|axis| AxisMetadata {
                label: axis.label.clone(),
                unit: axis.unit.clone(),
                range: axis.range.as_ref().map(|r| bin_range(r, bin)),
            })
            .collect();

        let result = Dataset::with_axes(binned, axes)?
            .with_data_label(data.data_label(), data.data_unit());
        Ok((result, kwargs))
    }

    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}
