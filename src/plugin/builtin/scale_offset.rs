//! Linear rescaling of data values, applied in place.

use crate::data::Dataset;
use crate::error::{Result, WorkflowError};
use crate::plugin::params::{ParamValue, Parameter, ParameterCollection};
use crate::plugin::traits::{Kwargs, Plugin, PluginInput, PluginType, ShapeState};

/// Computes `value * factor + offset` on the input buffer.
#[derive(Clone)]
pub struct ScaleOffset {
    params: ParameterCollection,
    shapes: ShapeState,
}

impl ScaleOffset {
    pub const CLASS_NAME: &'static str = "ScaleOffset";

    pub fn new() -> Self {
        Self {
            params: ParameterCollection::new()
                .with(Parameter::new("factor", ParamValue::Float(1.0)))
                .with(Parameter::new("offset", ParamValue::Float(0.0))),
            shapes: ShapeState::default(),
        }
    }

    /// Convenience constructor.
    pub fn with_values(factor: f64, offset: f64) -> Result<Self> {
        let mut plugin = Self::new();
        plugin.params.set("factor", ParamValue::Float(factor))?;
        plugin.params.set("offset", ParamValue::Float(offset))?;
        Ok(plugin)
    }
}

impl Default for ScaleOffset {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ScaleOffset {
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
        input_shape
            .map(<[usize]>::to_vec)
            .ok_or_else(|| WorkflowError::config("ScaleOffset needs a propagated input shape"))
    }

    fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
        let mut data = input.into_dataset(Self::CLASS_NAME)?;
        let factor = self.params.get_float("factor")?;
        let offset = self.params.get_float("offset")?;
        data.array_mut().mapv_inplace(|v| v * factor + offset);
        Ok((data, kwargs))
    }

    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}
