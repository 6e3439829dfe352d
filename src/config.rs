//! Run configuration loaded from YAML.

use crate::error::Result;
use crate::runtime::{AbortOnError, FrameErrorPolicy, MaxFailuresPolicy, SkipFailedFrames};
use crate::scan::ScanGeometry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// How failed frames are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorPolicyConfig {
    /// Stop at the first failing frame.
    #[default]
    Abort,
    /// Skip frames whose plugins fail.
    Skip,
    /// Skip at most `limit` failing frames.
    MaxFailures { limit: usize },
}

impl ErrorPolicyConfig {
    pub fn build(&self) -> Arc<dyn FrameErrorPolicy> {
        match *self {
            ErrorPolicyConfig::Abort => Arc::new(AbortOnError),
            ErrorPolicyConfig::Skip => Arc::new(SkipFailedFrames),
            ErrorPolicyConfig::MaxFailures { limit } => Arc::new(MaxFailuresPolicy::new(limit)),
        }
    }
}

/// Configuration for the scan runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Number of worker threads; 0 means one per CPU.
    pub worker_count: usize,
    pub error_policy: ErrorPolicyConfig,
}

impl RunnerConfig {
    /// Worker count with 0 resolved to the number of CPUs.
    pub fn workers(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.worker_count
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            error_policy: ErrorPolicyConfig::default(),
        }
    }
}

/// Scan geometry plus runner settings for one processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub scan: ScanGeometry,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl ProcessingConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
scan:
  - label: y
    unit: mm
    n_points: 4
    delta: 0.5
  - label: x
    unit: mm
    n_points: 6
runner:
  worker_count: 3
  error_policy:
    kind: max_failures
    limit: 2
"#;
        let config = ProcessingConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.scan.shape(), vec![4, 6]);
        assert_eq!(config.scan.axes()[0].delta, 0.5);
        assert_eq!(config.scan.axes()[1].delta, 1.0);
        assert_eq!(config.runner.workers(), 3);
        assert_eq!(
            config.runner.error_policy,
            ErrorPolicyConfig::MaxFailures { limit: 2 }
        );
    }

    #[test]
    fn test_defaults() {
        let config = ProcessingConfig::from_yaml_str("scan:\n  - n_points: 5\n").unwrap();
        assert_eq!(config.runner, RunnerConfig::default());
        assert!(config.runner.workers() >= 1);
        assert_eq!(config.runner.error_policy, ErrorPolicyConfig::Abort);
    }

    #[test]
    fn test_invalid_scan_rejected() {
        let too_many = "scan:\n  - n_points: 2\n  - n_points: 2\n  - n_points: 2\n  - n_points: 2\n  - n_points: 2\n";
        assert!(matches!(
            ProcessingConfig::from_yaml_str(too_many),
            Err(WorkflowError::Serialization(_))
        ));
        assert!(ProcessingConfig::from_yaml_str("scan:\n  - n_points: 0\n").is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = ProcessingConfig {
            scan: ScanGeometry::from_shape(&[3, 2]).unwrap(),
            runner: RunnerConfig {
                worker_count: 2,
                error_policy: ErrorPolicyConfig::Skip,
            },
        };
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(ProcessingConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
