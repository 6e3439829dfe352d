//! YAML import and export of workflow trees.
//!
//! A tree is stored as a flat list of node records. Import runs in two
//! passes: every plugin is instantiated and configured first, then the
//! parent and child links are wired and the structure is validated.

use super::node::TreeNode;
use super::{NodeId, WorkflowTree};
use crate::error::{Result, WorkflowError};
use crate::plugin::{ParamValue, PluginRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Serialized form of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub plugin_class: String,
    /// `(key, value)` pairs in declaration order.
    #[serde(default)]
    pub plugin_params: Vec<(String, ParamValue)>,
    #[serde(default)]
    pub retain_result: bool,
}

/// Records for every node, ascending by id.
pub fn export_records(tree: &WorkflowTree) -> Vec<NodeRecord> {
    tree.nodes()
        .map(|node| NodeRecord {
            node_id: node.node_id(),
            parent: node.parent(),
            children: node.children().to_vec(),
            plugin_class: node.plugin().class_name().to_string(),
            plugin_params: node.plugin().params().to_pairs(),
            retain_result: node.is_flagged_for_retention(),
        })
        .collect()
}

/// Serialize a tree to YAML.
pub fn to_yaml(tree: &WorkflowTree) -> Result<String> {
    Ok(serde_yaml::to_string(&export_records(tree))?)
}

/// Rebuild a tree from node records.
///
/// Fails with a configuration error on unknown plugin classes, invalid
/// parameters, duplicate ids or inconsistent links.
pub fn import_records(records: &[NodeRecord], registry: &PluginRegistry) -> Result<WorkflowTree> {
    let mut nodes = BTreeMap::new();
    for record in records {
        let mut plugin = registry.create(&record.plugin_class)?;
        for (key, value) in &record.plugin_params {
            plugin.set_param(key, value.clone()).map_err(|e| {
                WorkflowError::config(format!("Node {}: {}", record.node_id, e))
            })?;
        }

        let mut node = TreeNode::new(record.node_id, record.parent, plugin);
        node.set_retain_result(record.retain_result);
        if nodes.insert(record.node_id, node).is_some() {
            return Err(WorkflowError::config(format!(
                "Duplicate node id {}",
                record.node_id
            )));
        }
    }

    for record in records {
        if let Some(parent) = record.parent {
            if !nodes.contains_key(&parent) {
                return Err(WorkflowError::config(format!(
                    "Node {} references missing parent {}",
                    record.node_id, parent
                )));
            }
        }

        let unique: BTreeSet<NodeId> = record.children.iter().copied().collect();
        if unique.len() != record.children.len() {
            return Err(WorkflowError::config(format!(
                "Node {} lists a child twice",
                record.node_id
            )));
        }
        for child in &record.children {
            let child_parent = records
                .iter()
                .find(|r| r.node_id == *child)
                .map(|r| r.parent)
                .ok_or_else(|| {
                    WorkflowError::config(format!(
                        "Node {} references missing child {}",
                        record.node_id, child
                    ))
                })?;
            if child_parent != Some(record.node_id) {
                return Err(WorkflowError::config(format!(
                    "Node {} lists child {} whose parent is {:?}",
                    record.node_id, child, child_parent
                )));
            }
        }

        if let Some(node) = nodes.get_mut(&record.node_id) {
            node.set_children(record.children.clone());
        }
    }

    let tree = WorkflowTree::from_linked_nodes(nodes.into_values().collect())?;
    tracing::debug!(nodes = tree.len(), "Imported workflow tree");
    Ok(tree)
}

/// Parse a tree from YAML.
pub fn from_yaml(yaml: &str, registry: &PluginRegistry) -> Result<WorkflowTree> {
    let records: Vec<NodeRecord> = serde_yaml::from_str(yaml)?;
    import_records(&records, registry)
}

/// Write a tree to a YAML file.
pub fn save(tree: &WorkflowTree, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, to_yaml(tree)?)?;
    Ok(())
}

/// Read a tree from a YAML file.
pub fn load(path: impl AsRef<Path>, registry: &PluginRegistry) -> Result<WorkflowTree> {
    let yaml = std::fs::read_to_string(path)?;
    from_yaml(&yaml, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::builtin::{Crop, FrameLoader, ScaleOffset, SumFrame};
    use crate::plugin::Plugin;

    fn sample_tree() -> WorkflowTree {
        let mut tree = WorkflowTree::new();
        tree.create_and_add_node(Box::new(FrameLoader::new()), None, None).unwrap();
        let mut crop = Crop::new();
        crop.set_param("roi", ParamValue::IntList(vec![1, -1, 0, 0])).unwrap();
        let crop_id = tree.create_and_add_node(Box::new(crop), None, None).unwrap();
        tree.create_and_add_node(Box::new(SumFrame::new()), None, None).unwrap();
        tree.create_and_add_node(
            Box::new(ScaleOffset::with_values(2.0, 0.5).unwrap()),
            Some(crop_id),
            Some(7),
        )
        .unwrap();
        tree.set_node_retained(crop_id, true).unwrap();
        tree
    }

    #[test]
    fn test_yaml_preserves_structure_and_params() {
        let tree = sample_tree();
        let yaml = to_yaml(&tree).unwrap();
        let restored = from_yaml(&yaml, &PluginRegistry::new_with_defaults()).unwrap();

        assert_eq!(export_records(&restored), export_records(&tree));
        assert_eq!(restored.root(), Some(0));
        assert_eq!(restored.node(1).unwrap().children(), &[2, 7]);
        assert!(restored.node(1).unwrap().is_flagged_for_retention());
        assert_eq!(
            restored.node(7).unwrap().plugin().params().get_float("factor").unwrap(),
            2.0
        );
        assert_eq!(restored.next_node_id(), 8);
    }

    #[test]
    fn test_import_bare_record_list() {
        let yaml = "\
- node_id: 0
  parent: null
  children: [1]
  plugin_class: FrameLoader
  plugin_params: []
- node_id: 1
  parent: 0
  children: []
  plugin_class: ScaleOffset
  plugin_params:
    - [factor, 3.0]
  retain_result: true
";
        let tree = from_yaml(yaml, &PluginRegistry::new_with_defaults()).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.root(), Some(0));
        assert!(tree.node(1).unwrap().is_flagged_for_retention());
        assert_eq!(
            tree.node(1).unwrap().plugin().params().get_float("factor").unwrap(),
            3.0
        );
        assert!(to_yaml(&tree).unwrap().starts_with("- node_id: 0"));
    }

    #[test]
    fn test_unknown_plugin_class() {
        let yaml = "- node_id: 0\n  plugin_class: Nope\n";
        let result = from_yaml(yaml, &PluginRegistry::new_with_defaults());
        assert!(matches!(result, Err(WorkflowError::Config(_))));
    }

    #[test]
    fn test_inconsistent_links_rejected() {
        let registry = PluginRegistry::new_with_defaults();
        let mut records = export_records(&sample_tree());

        let mut orphan = records.clone();
        orphan[1].parent = Some(42);
        assert!(import_records(&orphan, &registry).is_err());

        let mut two_roots = records.clone();
        two_roots[2].parent = None;
        two_roots[1].children = vec![7];
        assert!(import_records(&two_roots, &registry).is_err());

        records[0].children.clear();
        assert!(import_records(&records, &registry).is_err());
    }

    #[test]
    fn test_bad_param_value() {
        let registry = PluginRegistry::new_with_defaults();
        let mut records = export_records(&sample_tree());
        records[1]
            .plugin_params
            .push(("roi".into(), ParamValue::Str("all".into())));
        assert!(matches!(
            import_records(&records, &registry),
            Err(WorkflowError::Config(_))
        ));
    }
}
