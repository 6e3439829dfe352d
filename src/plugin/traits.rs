//! Plugin trait definitions.

use super::params::{ParamValue, ParameterCollection};
use crate::data::Dataset;
use crate::error::{Result, WorkflowError};
use crate::scan::ExecutionContext;
use std::collections::BTreeMap;

/// Keyword arguments passed down the tree alongside the data.
pub type Kwargs = BTreeMap<String, ParamValue>;

/// Key under which the current frame index travels in [`Kwargs`].
pub const FRAME_INDEX_KEY: &str = "frame_index";

/// Role of a plugin in a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginType {
    /// Produces data from a frame index; only valid at the root.
    Input,
    /// Transforms its parent's output.
    Processing,
    /// Terminal plugin whose output is meant to be kept.
    Output,
}

impl PluginType {
    pub fn name(&self) -> &'static str {
        match self {
            PluginType::Input => "input",
            PluginType::Processing => "processing",
            PluginType::Output => "output",
        }
    }
}

/// Declared dimensionality of plugin input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDim {
    /// Exactly this many dimensions.
    Fixed(usize),
    /// Same number of dimensions as the input.
    SameAsInput,
    /// Not known until the plugin is configured or run.
    Unknown,
}

/// Data handed to [`Plugin::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum PluginInput {
    /// Frame index, given to the root input plugin.
    Frame(usize),
    /// Output of the parent node.
    Data(Dataset),
}

impl PluginInput {
    /// The frame index, or an execution error naming `plugin`.
    pub fn frame_index(&self, plugin: &str) -> Result<usize> {
        match self {
            PluginInput::Frame(index) => Ok(*index),
            PluginInput::Data(_) => Err(WorkflowError::execution(
                plugin,
                "expected a frame index but received data",
            )),
        }
    }

    /// The dataset, or an execution error naming `plugin`.
    pub fn into_dataset(self, plugin: &str) -> Result<Dataset> {
        match self {
            PluginInput::Data(data) => Ok(data),
            PluginInput::Frame(index) => Err(WorkflowError::execution(
                plugin,
                format!("expected data but received frame index {}", index),
            )),
        }
    }
}

/// Input and result shapes recorded during shape propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeState {
    pub input_shape: Option<Vec<usize>>,
    pub result_shape: Option<Vec<usize>>,
}

/// A unit of computation held by one tree node.
///
/// Implementors provide the parameter set, shape calculation and the
/// per-frame transform. Plugins may mutate their input in place: the tree
/// only copies data where the workflow branches.
pub trait Plugin: Send + Sync {
    /// Registry name of this plugin class.
    fn class_name(&self) -> &'static str;

    fn plugin_type(&self) -> PluginType;

    fn input_data_dim(&self) -> DataDim {
        DataDim::Unknown
    }

    fn output_data_dim(&self) -> DataDim {
        DataDim::SameAsInput
    }

    fn params(&self) -> &ParameterCollection;

    fn params_mut(&mut self) -> &mut ParameterCollection;

    fn shapes(&self) -> &ShapeState;

    fn shapes_mut(&mut self) -> &mut ShapeState;

    /// One-time setup before a scan.
    fn pre_execute(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Result shape for one frame given the (propagated) input shape.
    ///
    /// Input plugins receive `None` and derive the shape from their source.
    fn compute_result_shape(&self, input_shape: Option<&[usize]>) -> Result<Vec<usize>>;

    /// Process one frame.
    fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)>;

    /// Deep copy including parameters and per-run state.
    fn box_clone(&self) -> Box<dyn Plugin>;

    fn input_shape(&self) -> Option<&[usize]> {
        self.shapes().input_shape.as_deref()
    }

    fn result_shape(&self) -> Option<&[usize]> {
        self.shapes().result_shape.as_deref()
    }

    fn set_input_shape(&mut self, shape: &[usize]) {
        self.shapes_mut().input_shape = Some(shape.to_vec());
    }

    /// Compute and store the result shape, checking declared dimensions.
    fn calculate_result_shape(&mut self) -> Result<()> {
        let name = self.class_name();

        if let (DataDim::Fixed(ndim), Some(input)) = (self.input_data_dim(), self.input_shape()) {
            if input.len() != ndim {
                return Err(WorkflowError::config(format!(
                    "{} expects {}-dimensional input, got shape {:?}",
                    name, ndim, input
                )));
            }
        }

        let shape = self.compute_result_shape(self.input_shape())?;

        match (self.output_data_dim(), self.input_shape()) {
            (DataDim::Fixed(ndim), _) if shape.len() != ndim => {
                return Err(WorkflowError::config(format!(
                    "{} declares {}-dimensional output but computed shape {:?}",
                    name, ndim, shape
                )));
            }
            (DataDim::SameAsInput, Some(input)) if input.len() != shape.len() => {
                return Err(WorkflowError::config(format!(
                    "{} must keep the input dimensionality {:?} but computed shape {:?}",
                    name, input, shape
                )));
            }
            _ => {}
        }

        self.shapes_mut().result_shape = Some(shape);
        Ok(())
    }

    /// Shorthand for setting a parameter.
    fn set_param(&mut self, key: &str, value: ParamValue) -> Result<()> {
        self.params_mut().set(key, value)
    }
}

impl Clone for Box<dyn Plugin> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("class_name", &self.class_name())
            .field("plugin_type", &self.plugin_type())
            .field("result_shape", &self.result_shape())
            .finish()
    }
}
