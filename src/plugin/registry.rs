//! Plugin registry for resolving plugin classes by name.

use super::builtin::{
    Binning, Crop, FrameLoader, PeakFit, PolynomialBackground, ScaleOffset, SumFrame,
};
use super::traits::Plugin;
use crate::error::{Result, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Registry of plugin classes, keyed by class name.
///
/// Used when rebuilding a workflow from its serialized form.
#[derive(Clone)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in plugins registered.
    pub fn new_with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_default::<FrameLoader>();
        registry.register_default::<Crop>();
        registry.register_default::<Binning>();
        registry.register_default::<ScaleOffset>();
        registry.register_default::<SumFrame>();
        registry.register_default::<PolynomialBackground>();
        registry.register_default::<PeakFit>();
        registry
    }

    /// Register a factory under `class_name`, replacing any previous one.
    pub fn register<F>(&mut self, class_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(class_name.into(), Arc::new(factory));
    }

    /// Register a plugin type under its own class name.
    pub fn register_default<P>(&mut self)
    where
        P: Plugin + Default + 'static,
    {
        let name = P::default().class_name();
        self.register(name, || Box::new(P::default()) as Box<dyn Plugin>);
    }

    /// Instantiate a plugin by class name.
    pub fn create(&self, class_name: &str) -> Result<Box<dyn Plugin>> {
        self.factories
            .get(class_name)
            .map(|factory| factory())
            .ok_or_else(|| {
                WorkflowError::config(format!("Unknown plugin class '{}'", class_name))
            })
    }

    /// Check if a class is registered.
    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a class.
    pub fn remove(&mut self, class_name: &str) -> bool {
        self.factories.remove(class_name).is_some()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
