//! Input plugin reading frames from the context's frame source.

use crate::data::{AxisMetadata, Dataset, FrameSource};
use crate::error::{Result, WorkflowError};
use crate::plugin::params::{ParamValue, Parameter, ParameterCollection};
use crate::plugin::traits::{
    DataDim, Kwargs, Plugin, PluginInput, PluginType, ShapeState, FRAME_INDEX_KEY,
};
use crate::scan::ExecutionContext;
use std::sync::Arc;

/// Loads the detector frame belonging to each scan point.
///
/// Frame `i` of the scan reads source frame `i + frame_offset`.
#[derive(Clone)]
pub struct FrameLoader {
    params: ParameterCollection,
    shapes: ShapeState,
    source: Option<Arc<dyn FrameSource>>,
}

impl FrameLoader {
    pub const CLASS_NAME: &'static str = "FrameLoader";

    pub fn new() -> Self {
        Self {
            params: ParameterCollection::new()
                .with(
                    Parameter::new("frame_offset", ParamValue::Int(0))
                        .with_description("Index of the source frame read for scan point 0"),
                )
                .with(
                    Parameter::new("data_label", ParamValue::Str("intensity".into()))
                        .with_description("Label of the loaded values"),
                )
                .with(Parameter::new("data_unit", ParamValue::Str("counts".into()))),
            shapes: ShapeState::default(),
            source: None,
        }
    }

    fn source(&self) -> Result<&Arc<dyn FrameSource>> {
        self.source.as_ref().ok_or_else(|| {
            WorkflowError::config(format!(
                "{} has no frame source; attach one to the execution context",
                Self::CLASS_NAME
            ))
        })
    }
}

impl Default for FrameLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for FrameLoader {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Input
    }

    fn output_data_dim(&self) -> DataDim {
        DataDim::Unknown
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

    fn pre_execute(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let source = ctx.frame_source().cloned().ok_or_else(|| {
            WorkflowError::config(format!(
                "{} requires a frame source in the execution context",
                Self::CLASS_NAME
            ))
        })?;

        let offset = self.params.get_usize("frame_offset")?;
        let needed = offset + ctx.scan().n_total();
        if source.n_frames() < needed {
            return Err(WorkflowError::config(format!(
                "Scan needs {} frames (offset {}) but the source holds {}",
                needed,
                offset,
                source.n_frames()
            )));
        }

        self.source = Some(source);
        Ok(())
    }

    fn compute_result_shape(&self, _input_shape: Option<&[usize]>) -> Result<Vec<usize>> {
        Ok(self.source()?.frame_shape())
    }

    fn execute(&mut self, input: PluginInput, mut kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
        let frame_index = input.frame_index(Self::CLASS_NAME)?;
        let offset = self.params.get_usize("frame_offset")?;
        let frame = self
            .source()?
            .read_frame(frame_index + offset)
            .map_err(|e| WorkflowError::execution(Self::CLASS_NAME, e.to_string()))?;

        let axes = match frame.ndim() {
            2 => vec![
                AxisMetadata::new("detector y", "pixel")
                    .with_range(ndarray::Array1::range(0.0, frame.shape()[0] as f64, 1.0)),
                AxisMetadata::new("detector x", "pixel")
                    .with_range(ndarray::Array1::range(0.0, frame.shape()[1] as f64, 1.0)),
            ],
            _ => frame.shape().iter().map(|&n| AxisMetadata::index(n)).collect(),
        };
        let dataset = Dataset::with_axes(frame, axes)?.with_data_label(
            self.params.get_str("data_label")?,
            self.params.get_str("data_unit")?,
        );

        kwargs.insert(FRAME_INDEX_KEY.to_string(), ParamValue::Int(frame_index as i64));
        Ok((dataset, kwargs))
    }

    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}
