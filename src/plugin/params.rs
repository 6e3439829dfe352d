//! Typed plugin parameters.

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parameter or keyword-argument value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    None,
}

impl ParamValue {
    pub fn kind(&self) -> Option<ParamKind> {
        match self {
            ParamValue::Bool(_) => Some(ParamKind::Bool),
            ParamValue::Int(_) => Some(ParamKind::Int),
            ParamValue::Float(_) => Some(ParamKind::Float),
            ParamValue::Str(_) => Some(ParamKind::Str),
            ParamValue::IntList(_) => Some(ParamKind::IntList),
            ParamValue::FloatList(_) => Some(ParamKind::FloatList),
            ParamValue::None => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Convert to `kind` where the conversion is lossless.
    fn coerce(self, kind: ParamKind) -> Option<Self> {
        match (self, kind) {
            (ParamValue::Int(v), ParamKind::Float) => Some(ParamValue::Float(v as f64)),
            (ParamValue::IntList(v), ParamKind::FloatList) => {
                Some(ParamValue::FloatList(v.into_iter().map(|x| x as f64).collect()))
            }
            // An empty YAML list deserialises as an int list.
            (ParamValue::FloatList(v), ParamKind::IntList) if v.is_empty() => {
                Some(ParamValue::IntList(Vec::new()))
            }
            (value, kind) if value.kind() == Some(kind) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{:?}", v),
            ParamValue::IntList(v) => write!(f, "{:?}", v),
            ParamValue::FloatList(v) => write!(f, "{:?}", v),
            ParamValue::None => write!(f, "None"),
        }
    }
}

/// Declared type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Str,
    IntList,
    FloatList,
}

/// A named, typed parameter with its current value.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    key: String,
    kind: ParamKind,
    value: ParamValue,
    /// `None` is accepted as a value.
    optional: bool,
    unit: String,
    description: String,
}

impl Parameter {
    /// Declare a parameter with its default value.
    ///
    /// The kind is taken from the default; use [`Parameter::optional`] for
    /// parameters whose default is `None`.
    pub fn new(key: impl Into<String>, default: ParamValue) -> Self {
        let kind = default.kind().unwrap_or(ParamKind::Str);
        Self {
            key: key.into(),
            kind,
            value: default,
            optional: false,
            unit: String::new(),
            description: String::new(),
        }
    }

    /// Declare a parameter of `kind` that defaults to `None`.
    pub fn optional(key: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            key: key.into(),
            kind,
            value: ParamValue::None,
            optional: true,
            unit: String::new(),
            description: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn set(&mut self, value: ParamValue) -> Result<()> {
        if value == ParamValue::None {
            if self.optional {
                self.value = value;
                return Ok(());
            }
            return Err(WorkflowError::config(format!(
                "Parameter '{}' does not accept None",
                self.key
            )));
        }

        let shown = value.to_string();
        self.value = value.coerce(self.kind).ok_or_else(|| {
            WorkflowError::config(format!(
                "Parameter '{}' expects {:?}, got {}",
                self.key, self.kind, shown
            ))
        })?;
        Ok(())
    }
}

/// Ordered set of parameters owned by one plugin.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterCollection {
    params: Vec<Parameter>,
}

impl ParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter declaration (builder style).
    pub fn with(mut self, param: Parameter) -> Self {
        self.add(param);
        self
    }

    /// Add or replace a parameter declaration.
    pub fn add(&mut self, param: Parameter) {
        match self.params.iter_mut().find(|p| p.key == param.key) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.iter().any(|p| p.key == key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn parameter(&self, key: &str) -> Result<&Parameter> {
        self.params
            .iter()
            .find(|p| p.key == key)
            .ok_or_else(|| WorkflowError::config(format!("Unknown parameter '{}'", key)))
    }

    pub fn get(&self, key: &str) -> Result<&ParamValue> {
        self.parameter(key).map(Parameter::value)
    }

    /// Set a value, checking the key exists and the type matches.
    pub fn set(&mut self, key: &str, value: ParamValue) -> Result<()> {
        self.params
            .iter_mut()
            .find(|p| p.key == key)
            .ok_or_else(|| WorkflowError::config(format!("Unknown parameter '{}'", key)))?
            .set(value)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(type_error(key, "bool", other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(type_error(key, "int", other)),
        }
    }

    /// Integer parameter that must not be negative.
    pub fn get_usize(&self, key: &str) -> Result<usize> {
        let value = self.get_int(key)?;
        usize::try_from(value).map_err(|_| {
            WorkflowError::config(format!("Parameter '{}' must not be negative, got {}", key, value))
        })
    }

    pub fn get_float(&self, key: &str) -> Result<f64> {
        let value = self.get(key)?;
        value.as_float().ok_or_else(|| type_error(key, "float", value))
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            ParamValue::Str(v) => Ok(v),
            other => Err(type_error(key, "string", other)),
        }
    }

    pub fn get_int_list(&self, key: &str) -> Result<&[i64]> {
        match self.get(key)? {
            ParamValue::IntList(v) => Ok(v),
            other => Err(type_error(key, "int list", other)),
        }
    }

    pub fn get_float_list(&self, key: &str) -> Result<&[f64]> {
        match self.get(key)? {
            ParamValue::FloatList(v) => Ok(v),
            other => Err(type_error(key, "float list", other)),
        }
    }

    /// Whether an optional parameter currently holds `None`.
    pub fn is_none(&self, key: &str) -> Result<bool> {
        Ok(matches!(self.get(key)?, ParamValue::None))
    }

    /// `(key, value)` pairs in declaration order.
    pub fn to_pairs(&self) -> Vec<(String, ParamValue)> {
        self.params
            .iter()
            .map(|p| (p.key.clone(), p.value.clone()))
            .collect()
    }

    /// Apply `(key, value)` pairs, failing on the first invalid entry.
    pub fn apply_pairs<'a>(
        &mut self,
        pairs: impl IntoIterator<Item = &'a (String, ParamValue)>,
    ) -> Result<()> {
        for (key, value) in pairs {
            self.set(key, value.clone())?;
        }
        Ok(())
    }
}

fn type_error(key: &str, expected: &str, actual: &ParamValue) -> WorkflowError {
    WorkflowError::config(format!(
        "Parameter '{}' is not a {} (value: {})",
        key, expected, actual
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> ParameterCollection {
        ParameterCollection::new()
            .with(Parameter::new("bin_size", ParamValue::Int(2)))
            .with(Parameter::new("factor", ParamValue::Float(1.0)).with_unit("a.u."))
            .with(Parameter::new("roi", ParamValue::IntList(vec![])))
            .with(Parameter::optional("label", ParamKind::Str))
    }

    #[test]
    fn test_get_and_set() {
        let mut params = collection();
        assert_eq!(params.get_int("bin_size").unwrap(), 2);

        params.set("bin_size", ParamValue::Int(4)).unwrap();
        assert_eq!(params.get_usize("bin_size").unwrap(), 4);
        assert_eq!(params.parameter("factor").unwrap().unit(), "a.u.");
    }

    #[test]
    fn test_int_coerces_to_float() {
        let mut params = collection();
        params.set("factor", ParamValue::Int(3)).unwrap();
        assert_eq!(params.get("factor").unwrap(), &ParamValue::Float(3.0));
    }

    #[test]
    fn test_type_and_key_errors() {
        let mut params = collection();
        assert!(params.set("bin_size", ParamValue::Str("x".into())).is_err());
        assert!(params.set("missing", ParamValue::Int(1)).is_err());
        assert!(params.set("bin_size", ParamValue::None).is_err());
        assert!(params.get_str("bin_size").is_err());

        params.set("bin_size", ParamValue::Int(-1)).unwrap();
        assert!(params.get_usize("bin_size").is_err());
    }

    #[test]
    fn test_optional_accepts_none() {
        let mut params = collection();
        assert!(params.is_none("label").unwrap());
        params.set("label", ParamValue::Str("det".into())).unwrap();
        assert_eq!(params.get_str("label").unwrap(), "det");
        params.set("label", ParamValue::None).unwrap();
        assert!(params.is_none("label").unwrap());
    }

    #[test]
    fn test_pairs_roundtrip_through_apply() {
        let mut source = collection();
        source.set("roi", ParamValue::IntList(vec![1, 5])).unwrap();
        let pairs = source.to_pairs();

        let mut target = collection();
        target.apply_pairs(&pairs).unwrap();
        assert_eq!(target, source);
    }

    #[test]
    fn test_untagged_yaml_values() {
        let values: Vec<ParamValue> = serde_yaml::from_str("[true, 3, 2.5, text, [1, 2], [0.5], null]").unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Bool(true),
                ParamValue::Int(3),
                ParamValue::Float(2.5),
                ParamValue::Str("text".into()),
                ParamValue::IntList(vec![1, 2]),
                ParamValue::FloatList(vec![0.5]),
                ParamValue::None,
            ]
        );
    }
}
