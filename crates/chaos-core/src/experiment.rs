use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::activity::{ActivityContext, Secrets};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    /// Default targets for every step that does not name its own.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Looked up before the process environment when connecting.
    #[serde(default)]
    pub secrets: Secrets,
    /// Steps, run in order.
    pub method: Vec<ActivityInvocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityInvocation {
    pub activity: String,
    #[serde(default)]
    pub targets: Option<Vec<String>>,
    #[serde(default)]
    pub params: serde_yaml::Value,
    /// Overrides the activity's default execution duration.
    #[serde(with = "humantime_serde", default)]
    pub duration: Option<Duration>,
    /// Time to wait after the step before moving on.
    #[serde(with = "humantime_serde", default)]
    pub pause_after: Option<Duration>,
}

impl ActivityInvocation {
    /// Build the run context, falling back to the experiment's targets.
    pub fn context(&self, experiment: &ExperimentConfig) -> ActivityContext {
        ActivityContext {
            targets: self
                .targets
                .clone()
                .unwrap_or_else(|| experiment.targets.clone()),
            params: self.params.clone(),
            duration: self.duration,
            secrets: experiment.secrets.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

/// Runtime state of a running experiment.
pub struct Experiment {
    pub id: Uuid,
    pub config: ExperimentConfig,
    pub status: ExperimentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            status: ExperimentStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }
}
