//! Single-peak Gaussian fit on 1D profiles.

use crate::data::{estimate_gaussian, find_peaks, highest_peak, AxisMetadata, Dataset, GaussianEstimate};
use crate::error::{Result, WorkflowError};
use crate::plugin::params::{ParamValue, Parameter, ParameterCollection};
use crate::plugin::traits::{DataDim, Kwargs, Plugin, PluginInput, PluginType, ShapeState};
use ndarray::{Array1, Ix1};

/// Names of the fitted values, in output order.
pub const PEAK_FIT_LABELS: [&str; 4] = ["center", "sigma", "amplitude", "background"];

/// Locates the most intense peak and estimates its Gaussian parameters.
///
/// The result is `[center, sigma, amplitude, background]`. Frames without
/// a peak above `min_height`/`min_prominence` yield NaN for every value so
/// the scan continues.
#[derive(Clone)]
pub struct PeakFit {
    params: ParameterCollection,
    shapes: ShapeState,
}

impl PeakFit {
    pub const CLASS_NAME: &'static str = "PeakFit";

    pub fn new() -> Self {
        Self {
            params: ParameterCollection::new()
                .with(Parameter::new("min_height", ParamValue::Float(0.0)))
                .with(Parameter::new("min_prominence", ParamValue::Float(0.0)))
                .with(
                    Parameter::new("fit_half_width", ParamValue::Int(10))
                        .with_unit("points")
                        .with_description("Initial half width of the fit window"),
                )
                .with(Parameter::new("range_multiplier", ParamValue::Float(3.0)))
                .with(Parameter::new("iterations", ParamValue::Int(5))),
            shapes: ShapeState::default(),
        }
    }

    fn range_multiplier(&self) -> Result<f64> {
        let value = self.params.get_float("range_multiplier")?;
        if !value.is_finite() || value <= 0.0 {
            return Err(WorkflowError::config(format!(
                "PeakFit range_multiplier must be finite and positive, got {}",
                value
            )));
        }
        Ok(value)
    }

    fn fit(&self, data: &Dataset) -> Result<GaussianEstimate> {
        let y = data
            .view()
            .into_dimensionality::<Ix1>()
            .map_err(|e| WorkflowError::execution(Self::CLASS_NAME, e.to_string()))?;
        let x = data.axis_coordinates(0);

        let peaks = find_peaks(
            y,
            self.params.get_float("min_height")?,
            self.params.get_float("min_prominence")?,
        );
        let Some(peak) = highest_peak(&peaks) else {
            tracing::debug!("PeakFit found no peak, returning NaN");
            return Ok(GaussianEstimate::nan());
        };

        Ok(estimate_gaussian(
            x.view(),
            y,
            peak.index,
            self.params.get_usize("fit_half_width")?,
            self.range_multiplier()?,
            self.params.get_usize("iterations")?,
        ))
    }
}

impl Default for PeakFit {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PeakFit {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Processing
    }

    fn input_data_dim(&self) -> DataDim {
        DataDim::Fixed(1)
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
        self.range_multiplier()?;
        Ok(vec![PEAK_FIT_LABELS.len()])
    }

    fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
        let data = input.into_dataset(Self::CLASS_NAME)?;
        let estimate = self.fit(&data)?;

        let unit = data.axis(0).map(|a| a.unit.clone()).unwrap_or_default();
        let axis = AxisMetadata::new(format!("fit parameter ({})", PEAK_FIT_LABELS.join(", ")), unit)
            .with_range(Array1::range(0.0, PEAK_FIT_LABELS.len() as f64, 1.0));
        let result = Dataset::with_axes(Array1::from(estimate.to_vec()).into_dyn(), vec![axis])?
            .with_data_label("peak fit", data.data_unit());
        Ok((result, kwargs))
    }

    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(center: f64) -> Dataset {
        let q = Array1::range(0.0, 4.0, 0.02);
        let truth = GaussianEstimate {
            center,
            sigma: 0.1,
            amplitude: 5.0,
            background: 0.5,
        };
        let mut data = Dataset::new(q.mapv(|v| truth.evaluate(v)).into_dyn());
        data.set_axis(0, AxisMetadata::new("q", "nm^-1").with_range(q)).unwrap();
        data
    }

    #[test]
    fn test_peak_fit_recovers_parameters() {
        let mut fit = PeakFit::new();
        fit.set_param("fit_half_width", ParamValue::Int(30)).unwrap();
        let (out, _) = fit.execute(PluginInput::Data(profile(2.0)), Kwargs::new()).unwrap();

        assert_eq!(out.shape(), &[4]);
        let values = out.array();
        assert!((values[[0]] - 2.0).abs() < 0.01, "center {}", values[[0]]);
        assert!((values[[1]] - 0.1).abs() < 0.02, "sigma {}", values[[1]]);
        assert!((values[[2]] - 5.0).abs() < 0.05, "amplitude {}", values[[2]]);
        assert_eq!(out.axis(0).unwrap().unit, "nm^-1");
    }

    #[test]
    fn test_no_peak_yields_nan() {
        let mut fit = PeakFit::new();
        let flat = Dataset::new(Array1::from_elem(20, 1.0).into_dyn());
        let (out, _) = fit.execute(PluginInput::Data(flat), Kwargs::new()).unwrap();
        assert!(out.array().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_large_range_multiplier() {
        let mut fit = PeakFit::new();
        fit.set_param("range_multiplier", ParamValue::Float(1e300)).unwrap();
        let (out, _) = fit.execute(PluginInput::Data(profile(2.0)), Kwargs::new()).unwrap();
        assert!(out.array()[[0]].is_finite());
    }

    #[test]
    fn test_invalid_range_multiplier() {
        let mut fit = PeakFit::new();
        for bad in [0.0, -2.0, f64::INFINITY, f64::NAN] {
            fit.set_param("range_multiplier", ParamValue::Float(bad)).unwrap();
            assert!(matches!(
                fit.compute_result_shape(Some(&[100])),
                Err(WorkflowError::Config(_))
            ));
            assert!(fit
                .execute(PluginInput::Data(profile(2.0)), Kwargs::new())
                .is_err());
        }
    }

    #[test]
    fn test_shape_is_fixed() {
        let mut fit = PeakFit::new();
        fit.set_input_shape(&[100]);
        fit.calculate_result_shape().unwrap();
        assert_eq!(fit.result_shape(), Some(&[4usize][..]));

        fit.set_input_shape(&[10, 10]);
        assert!(fit.calculate_result_shape().is_err());
    }
}
