//! Total intensity of a frame.

use crate::data::{AxisMetadata, Dataset};
use crate::error::Result;
use crate::plugin::params::{ParamValue, Parameter, ParameterCollection};
use crate::plugin::traits::{DataDim, Kwargs, Plugin, PluginInput, PluginType, ShapeState};
use ndarray::{arr1, ArrayD};

/// Sums all values of the input into a one-element result.
///
/// With `ignore_nan` set, NaN pixels (e.g. masked ones) do not poison the
/// sum.
#[derive(Clone)]
pub struct SumFrame {
    params: ParameterCollection,
    shapes: ShapeState,
}

impl SumFrame {
    pub const CLASS_NAME: &'static str = "SumFrame";

    pub fn new() -> Self {
        Self {
            params: ParameterCollection::new().with(Parameter::new("ignore_nan", ParamValue::Bool(true))),
            shapes: ShapeState::default(),
        }
    }
}

impl Default for SumFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SumFrame {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Processing
    }

    fn output_data_dim(&self) -> DataDim {
        DataDim::Fixed(1)
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

    fn compute_result_shape(&self, _input_shape: Option<&[usize]>) -> Result<Vec<usize>> {
        Ok(vec![1])
    }

    fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
        let data = input.into_dataset(Self::CLASS_NAME)?;
        let total = if self.params.get_bool("ignore_nan")? {
            data.array().iter().filter(|v| !v.is_nan()).sum::<f64>()
        } else {
            data.array().sum()
        };

        let array: ArrayD<f64> = arr1(&[total]).into_dyn();
        let result = Dataset::with_axes(array, vec![AxisMetadata::new("sum", "").with_range(arr1(&[0.0]))])?
            .with_data_label(data.data_label(), data.data_unit());
        Ok((result, kwargs))
    }

    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}
