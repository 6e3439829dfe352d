//! Scan-indexed aggregation of per-frame node results.

use crate::data::{AxisMetadata, Dataset};
use crate::error::{Result, WorkflowError};
use crate::scan::ScanGeometry;
use crate::tree::{FrameResults, NodeId, WorkflowTree};
use ndarray::{Array1, Axis};
use std::collections::BTreeMap;

/// Lifecycle of a [`WorkflowResults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsState {
    /// No composite arrays exist.
    Unallocated,
    /// Arrays are allocated; result-axis metadata not yet seen for every node.
    AllocatedMetadataPending,
    /// Arrays are allocated and every node carries full axis metadata.
    AllocatedMetadataComplete,
}

/// Axis and value description of one composite array.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMetadata {
    pub node_label: String,
    pub axis_labels: Vec<String>,
    pub axis_units: Vec<String>,
    pub axis_ranges: Vec<Array1<f64>>,
    pub data_label: String,
    pub data_unit: String,
    /// Whether the result axes were taken from a stored frame yet.
    pub complete: bool,
}

/// Single-owner aggregator of composite result arrays.
///
/// Every retained node gets one array of shape `scan_shape + result_shape`.
/// Frame results are written into the slot of their scan position, so
/// frames may arrive in any order and re-storing a frame overwrites it.
#[derive(Debug, Clone, Default)]
pub struct WorkflowResults {
    scan: Option<ScanGeometry>,
    composites: BTreeMap<NodeId, Dataset>,
    result_shapes: BTreeMap<NodeId, Vec<usize>>,
    node_labels: BTreeMap<NodeId, String>,
    metadata_complete: BTreeMap<NodeId, bool>,
    stored: Vec<bool>,
}

impl WorkflowResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResultsState {
        if self.scan.is_none() {
            ResultsState::Unallocated
        } else if self.metadata_complete.values().all(|&c| c) {
            ResultsState::AllocatedMetadataComplete
        } else {
            ResultsState::AllocatedMetadataPending
        }
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.scan.is_some()
    }

    /// Scan geometry captured at allocation.
    pub fn scan(&self) -> Option<&ScanGeometry> {
        self.scan.as_ref()
    }

    /// Number of scan points, zero while unallocated.
    pub fn n_total(&self) -> usize {
        self.stored.len()
    }

    /// Allocate zeroed composites for every retained node of a prepared tree.
    ///
    /// Discards anything stored before. The geometry is copied, so later
    /// changes to the caller's geometry require calling this again.
    pub fn update_shapes_from_scan_and_workflow(
        &mut self,
        scan: &ScanGeometry,
        tree: &WorkflowTree,
    ) -> Result<()> {
        if !tree.is_prepared() {
            return Err(WorkflowError::invalid_state(
                "The workflow tree must be prepared before allocating results",
            ));
        }

        let scan_shape = scan.shape();
        let scan_axes = scan.axis_metadata();
        let mut composites = BTreeMap::new();
        let mut result_shapes = BTreeMap::new();
        let mut node_labels = BTreeMap::new();

        for node_id in tree.retained_node_ids() {
            let result_shape = tree.result_shape(node_id)?;
            let full_shape: Vec<usize> = scan_shape.iter().chain(&result_shape).copied().collect();

            let axes = scan_axes
                .iter()
                .cloned()
                .chain(result_shape.iter().map(|&n| AxisMetadata::index(n)))
                .collect();
            let array = ndarray::ArrayD::zeros(ndarray::IxDyn(&full_shape));
            composites.insert(node_id, Dataset::with_axes(array, axes)?);

            let node = tree.node(node_id)?;
            node_labels.insert(
                node_id,
                format!("{} [node {}]", node.plugin().class_name(), node_id),
            );
            tracing::debug!(node_id, shape = ?full_shape, "Allocated composite array");
            result_shapes.insert(node_id, result_shape);
        }

        tracing::info!(
            nodes = composites.len(),
            n_total = scan.n_total(),
            scan_shape = ?scan_shape,
            "Allocated workflow results"
        );

        self.metadata_complete = composites.keys().map(|&id| (id, false)).collect();
        self.composites = composites;
        self.result_shapes = result_shapes;
        self.node_labels = node_labels;
        self.stored = vec![false; scan.n_total()];
        self.scan = Some(scan.clone());
        Ok(())
    }

    /// Write the results of one frame into their scan-position slots.
    ///
    /// Every result is shape-checked before anything is written, so a
    /// failing call leaves the composites unchanged. Ids without a composite
    /// are ignored.
    pub fn store_results(&mut self, frame_index: usize, results: &FrameResults) -> Result<()> {
        let scan = self.scan.as_ref().ok_or_else(|| {
            WorkflowError::invalid_state("store_results called before results were allocated")
        })?;
        let position = scan.frame_to_position(frame_index)?;
        let scan_dim = position.len();

        for (&node_id, data) in results {
            if let Some(expected) = self.result_shapes.get(&node_id) {
                if data.shape() != expected.as_slice() {
                    return Err(WorkflowError::ShapeMismatch {
                        node_id,
                        expected: expected.clone(),
                        actual: data.shape().to_vec(),
                    });
                }
            }
        }

        for (&node_id, data) in results {
            let Some(composite) = self.composites.get_mut(&node_id) else {
                continue;
            };

            let mut slot = composite.view_mut();
            for &p in &position {
                slot = slot.index_axis_move(Axis(0), p);
            }
            slot.assign(&data.view());

            let complete = self.metadata_complete.entry(node_id).or_insert(false);
            if !*complete {
                // Missing or mis-sized ranges become plain indices.
                for (k, axis) in data.axes().iter().enumerate() {
                    let axis = AxisMetadata {
                        range: Some(data.axis_coordinates(k)),
                        ..axis.clone()
                    };
                    composite.set_axis(scan_dim + k, axis)?;
                }
                composite.set_data_label(data.data_label(), data.data_unit());
                *complete = true;
                tracing::debug!(node_id, "Result metadata complete");
            }
        }

        if let Some(flag) = self.stored.get_mut(frame_index) {
            *flag = true;
        }
        Ok(())
    }

    /// Live composite array of a node.
    pub fn get_results(&self, node_id: NodeId) -> Result<&Dataset> {
        self.ensure_allocated()?;
        self.composites
            .get(&node_id)
            .ok_or(WorkflowError::UnknownNode(node_id))
    }

    /// Composite with the scan dimensions collapsed into one frame axis.
    pub fn get_results_flattened(&self, node_id: NodeId) -> Result<Dataset> {
        let composite = self.get_results(node_id)?;
        let result_shape = self
            .result_shapes
            .get(&node_id)
            .ok_or(WorkflowError::UnknownNode(node_id))?;
        let scan_dim = composite.ndim() - result_shape.len();

        let flat_shape: Vec<usize> = std::iter::once(self.n_total())
            .chain(result_shape.iter().copied())
            .collect();
        let array = composite
            .array()
            .to_owned()
            .into_shape_with_order(flat_shape)
            .map_err(|e| WorkflowError::invalid_state(format!("Cannot flatten results: {}", e)))?;

        let axes = std::iter::once(AxisMetadata {
            label: "frame index".to_string(),
            unit: String::new(),
            range: Some(Array1::range(0.0, self.n_total() as f64, 1.0)),
        })
        .chain(composite.axes()[scan_dim..].iter().cloned())
        .collect();

        Ok(Dataset::with_axes(array, axes)?
            .with_data_label(composite.data_label(), composite.data_unit()))
    }

    /// Axis labels, units and ranges of a composite.
    pub fn get_result_metadata(&self, node_id: NodeId) -> Result<ResultMetadata> {
        let composite = self.get_results(node_id)?;
        Ok(ResultMetadata {
            node_label: self.node_labels.get(&node_id).cloned().unwrap_or_default(),
            axis_labels: composite.axes().iter().map(|a| a.label.clone()).collect(),
            axis_units: composite.axes().iter().map(|a| a.unit.clone()).collect(),
            axis_ranges: (0..composite.ndim())
                .map(|i| composite.axis_coordinates(i))
                .collect(),
            data_label: composite.data_label().to_string(),
            data_unit: composite.data_unit().to_string(),
            complete: self.metadata_complete.get(&node_id).copied().unwrap_or(false),
        })
    }

    /// Drop all composites and return to the unallocated state.
    pub fn clear_all_results(&mut self) {
        self.scan = None;
        self.composites.clear();
        self.result_shapes.clear();
        self.node_labels.clear();
        self.metadata_complete.clear();
        self.stored.clear();
        tracing::debug!("Cleared workflow results");
    }

    /// Ids with a composite, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.composites.keys().copied().collect()
    }

    /// Full composite shape of every node.
    pub fn shapes(&self) -> BTreeMap<NodeId, Vec<usize>> {
        self.composites
            .iter()
            .map(|(&id, c)| (id, c.shape().to_vec()))
            .collect()
    }

    /// Number of distinct frames stored since allocation.
    pub fn n_stored_frames(&self) -> usize {
        self.stored.iter().filter(|&&s| s).count()
    }

    pub fn is_frame_stored(&self, frame_index: usize) -> bool {
        self.stored.get(frame_index).copied().unwrap_or(false)
    }

    fn ensure_allocated(&self) -> Result<()> {
        if self.scan.is_none() {
            return Err(WorkflowError::invalid_state("Workflow results are not allocated"));
        }
        Ok(())
    }
}
