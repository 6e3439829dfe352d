//! Polynomial background subtraction for 1D profiles.

use crate::data::Dataset;
use crate::error::{Result, WorkflowError};
use crate::plugin::params::{ParamValue, Parameter, ParameterCollection};
use crate::plugin::traits::{DataDim, Kwargs, Plugin, PluginInput, PluginType, ShapeState};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1};

/// Fits a polynomial of degree `order` to the profile by least squares and
/// subtracts it.
///
/// Coordinates are taken from the axis range when present. With
/// `clip_negative` set, values pushed below zero by the subtraction are
/// clamped to 0.
#[derive(Clone)]
pub struct PolynomialBackground {
    params: ParameterCollection,
    shapes: ShapeState,
}

impl PolynomialBackground {
    pub const CLASS_NAME: &'static str = "PolynomialBackground";

    pub fn new() -> Self {
        Self {
            params: ParameterCollection::new()
                .with(Parameter::new("order", ParamValue::Int(2)))
                .with(Parameter::new("clip_negative", ParamValue::Bool(false))),
            shapes: ShapeState::default(),
        }
    }
}

impl Default for PolynomialBackground {
    fn default() -> Self {
        Self::new()
    }
}

/// Least-squares polynomial coefficients, lowest order first.
///
/// Non-finite samples are excluded from the fit. `x` is rescaled to
/// `[-1, 1]` to keep the Vandermonde matrix well conditioned; the returned
/// closure evaluates the fitted polynomial at original coordinates.
pub fn fit_polynomial(
    x: ArrayView1<f64>,
    y: ArrayView1<f64>,
    order: usize,
) -> std::result::Result<impl Fn(f64) -> f64, String> {
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter(|(xi, yi)| xi.is_finite() && yi.is_finite())
        .map(|(&xi, &yi)| (xi, yi))
        .collect();

    if points.len() <= order {
        return Err(format!(
            "{} finite points are not enough for a polynomial of order {}",
            points.len(),
            order
        ));
    }

    let (lo, hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(xi, _)| {
            (lo.min(xi), hi.max(xi))
        });
    let center = 0.5 * (lo + hi);
    let half_span = if hi > lo { 0.5 * (hi - lo) } else { 1.0 };

    let n_coef = order + 1;
    let design = DMatrix::from_fn(points.len(), n_coef, |row, col| {
        ((points[row].0 - center) / half_span).powi(col as i32)
    });
    let target = DVector::from_iterator(points.len(), points.iter().map(|&(_, yi)| yi));

    let coefficients = design
        .svd(true, true)
        .solve(&target, 1e-12)
        .map_err(|e| e.to_string())?;

    Ok(move |xi: f64| {
        let t = (xi - center) / half_span;
        coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * t + c)
    })
}

impl Plugin for PolynomialBackground {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Processing
    }

    fn input_data_dim(&self) -> DataDim {
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

    fn compute_result_shape(&self, input_shape: Option<&[usize]>) -> Result<Vec<usize>> {
        let input = input_shape.ok_or_else(|| {
            WorkflowError::config("PolynomialBackground needs a propagated input shape")
        })?;
        let order = self.params.get_usize("order")?;
        if input.first().copied().unwrap_or(0) <= order {
            return Err(WorkflowError::config(format!(
                "A polynomial of order {} cannot be fitted to {:?} points",
                order, input
            )));
        }
        Ok(input.to_vec())
    }

    fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
        let mut data = input.into_dataset(Self::CLASS_NAME)?;
        if data.ndim() != 1 {
            return Err(WorkflowError::execution(
                Self::CLASS_NAME,
                format!("expected a 1D profile, got shape {:?}", data.shape()),
            ));
        }

        let order = self.params.get_usize("order")?;
        let clip = self.params.get_bool("clip_negative")?;
        let x: Array1<f64> = data.axis_coordinates(0);

        let values = data
            .view()
            .into_dimensionality::<ndarray::Ix1>()
            .map_err(|e| WorkflowError::execution(Self::CLASS_NAME, e.to_string()))?
            .to_owned();
        let background = fit_polynomial(x.view(), values.view(), order)
            .map_err(|e| WorkflowError::execution(Self::CLASS_NAME, e))?;

        for (value, &xi) in data.array_mut().iter_mut().zip(x.iter()) {
            *value -= background(xi);
            if clip && *value < 0.0 {
                *value = 0.0;
            }
        }
        Ok((data, kwargs))
    }

    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}
