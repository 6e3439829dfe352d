//! Rectangular region-of-interest crop.

use crate::data::{AxisMetadata, Dataset};
use crate::error::{Result, WorkflowError};
use crate::plugin::params::{ParamValue, Parameter, ParameterCollection};
use crate::plugin::traits::{Kwargs, Plugin, PluginInput, PluginType, ShapeState};
use ndarray::{s, Slice};

/// Crops every axis to `[start, stop)`.
///
/// `roi` holds one `start, stop` pair per input axis; negative values count
/// from the end of the axis and a `stop` of 0 means "to the end". An empty
/// `roi` leaves the data unchanged.
#[derive(Clone)]
pub struct Crop {
    params: ParameterCollection,
    shapes: ShapeState,
}

impl Crop {
    pub const CLASS_NAME: &'static str = "Crop";

    pub fn new() -> Self {
        Self {
            params: ParameterCollection::new().with(
                Parameter::new("roi", ParamValue::IntList(Vec::new()))
                    .with_description("start, stop pairs for every input axis"),
            ),
            shapes: ShapeState::default(),
        }
    }

    /// Resolve `roi` into `(start, stop)` bounds for `shape`.
    fn bounds(&self, shape: &[usize]) -> Result<Vec<(usize, usize)>> {
        let roi = self.params.get_int_list("roi")?;
        if roi.is_empty() {
            return Ok(shape.iter().map(|&n| (0, n)).collect());
        }
        if roi.len() != 2 * shape.len() {
            return Err(WorkflowError::config(format!(
                "Crop roi {:?} needs {} values for input shape {:?}",
                roi,
                2 * shape.len(),
                shape
            )));
        }

        shape
            .iter()
            .zip(roi.chunks(2))
            .enumerate()
            .map(|(axis, (&n, pair))| {
                let start = resolve(pair[0], n);
                let stop = if pair[1] == 0 { n as i64 } else { resolve(pair[1], n) };
                if start < 0 || stop > n as i64 || start >= stop {
                    return Err(WorkflowError::config(format!(
                        "Crop bounds {:?} are invalid for axis {} of length {}",
                        pair, axis, n
                    )));
                }
                Ok((start as usize, stop as usize))
            })
            .collect()
    }
}

fn resolve(value: i64, len: usize) -> i64 {
    if value < 0 {
        len as i64 + value
    } else {
        value
    }
}

impl Default for Crop {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Crop {
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
            .ok_or_else(|| WorkflowError::config("Crop needs a propagated input shape"))?;
        Ok(self
            .bounds(input)?
            .into_iter()
            .map(|(start, stop)| stop - start)
            .collect())
    }

    fn execute(&mut self, input: PluginInput, kwargs: Kwargs) -> Result<(Dataset, Kwargs)> {
        let data = input.into_dataset(Self::CLASS_NAME)?;
        let bounds = self
            .bounds(data.shape())
            .map_err(|e| WorkflowError::execution(Self::CLASS_NAME, e.to_string()))?;

        let cropped = data
            .view()
            .slice_each_axis(|ax| {
                let (start, stop) = bounds[ax.axis.index()];
                Slice::from(start as isize..stop as isize)
            })
            .to_owned();

        // A range whose length does not match its axis is dropped.
        let axes = data
            .axes()
            .iter()
            .zip(data.shape())
            .zip(&bounds)
            .map(|((axis, &n), &(start, stop))| AxisMetadata {
                label: axis.label.clone(),
                unit: axis.unit.clone(),
                range: axis
                    .range
                    .as_ref()
                    .filter(|r| r.len() == n)
                    .map(|r| r.slice(s![start..stop]).to_owned()),
            })
            .collect();

        let result = Dataset::with_axes(cropped, axes)?
            .with_data_label(data.data_label(), data.data_unit());
        Ok((result, kwargs))
    }

    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn image() -> Dataset {
        let array = Array2::from_shape_fn((4, 5), |(y, x)| (y * 10 + x) as f64).into_dyn();
        let mut ds = Dataset::new(array);
        ds.set_axis(1, AxisMetadata::new("x", "px").with_range(array![0.0, 1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        ds
    }

    #[test]
    fn test_crop_shape_and_values() {
        let mut crop = Crop::new();
        crop.set_param("roi", ParamValue::IntList(vec![1, 3, 2, 0])).unwrap();
        crop.set_input_shape(&[4, 5]);
        crop.calculate_result_shape().unwrap();
        assert_eq!(crop.result_shape(), Some(&[2usize, 3][..]));

        let (out, _) = crop.execute(PluginInput::Data(image()), Kwargs::new()).unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(out.array()[[0, 0]], 12.0);
        assert_eq!(out.array()[[1, 2]], 24.0);
        assert_eq!(out.axis(1).unwrap().range.as_ref().unwrap(), &array![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_mismatched_axis_range_is_dropped() {
        let mut ds = Dataset::new(array![0.0, 1.0, 2.0, 3.0, 4.0].into_dyn());
        ds.set_axis(0, AxisMetadata::new("x", "mm").with_range(array![7.0, 8.0]))
            .unwrap();

        let mut crop = Crop::new();
        crop.set_param("roi", ParamValue::IntList(vec![1, 4])).unwrap();
        let (out, _) = crop.execute(PluginInput::Data(ds), Kwargs::new()).unwrap();
        assert_eq!(out.shape(), &[3]);
        assert!(out.axis(0).unwrap().range.is_none());
        assert_eq!(out.axis(0).unwrap().label, "x");
        assert_eq!(out.axis_coordinates(0), array![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_negative_bounds() {
        let mut crop = Crop::new();
        crop.set_param("roi", ParamValue::IntList(vec![0, -1, -2, 0])).unwrap();
        assert_eq!(crop.compute_result_shape(Some(&[4, 5])).unwrap(), vec![3, 2]);
    }

    #[test]
    fn test_invalid_roi() {
        let mut crop = Crop::new();
        crop.set_param("roi", ParamValue::IntList(vec![3, 1, 0, 0])).unwrap();
        assert!(crop.compute_result_shape(Some(&[4, 5])).is_err());

        crop.set_param("roi", ParamValue::IntList(vec![0, 2])).unwrap();
        assert!(crop.compute_result_shape(Some(&[4, 5])).is_err());
        assert!(crop.compute_result_shape(None).is_err());
    }

    #[test]
    fn test_empty_roi_is_identity() {
        let crop = Crop::new();
        assert_eq!(crop.compute_result_shape(Some(&[4, 5])).unwrap(), vec![4, 5]);
    }
}
