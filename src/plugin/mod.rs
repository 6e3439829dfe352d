//! Plugin system: the per-node unit of computation.

pub mod builtin;
pub mod params;
pub mod registry;
pub mod traits;

pub use params::{ParamKind, ParamValue, Parameter, ParameterCollection};
pub use registry::PluginRegistry;
pub use traits::{
    DataDim, Kwargs, Plugin, PluginInput, PluginType, ShapeState, FRAME_INDEX_KEY,
};
