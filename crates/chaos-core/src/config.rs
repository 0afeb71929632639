use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ChaosError, ChaosResult};
use crate::experiment::ExperimentConfig;

/// Top-level experiment file structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChaosConfig {
    pub experiments: Vec<ExperimentConfig>,
}

impl ChaosConfig {
    pub fn from_file(path: &Path) -> ChaosResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChaosError::Config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> ChaosResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ChaosError::Config(format!("Invalid YAML: {e}")))?;
        for experiment in &config.experiments {
            if experiment.method.is_empty() {
                return Err(ChaosError::Config(format!(
                    "Experiment '{}' has no method steps",
                    experiment.name
                )));
            }
        }
        Ok(config)
    }
}
