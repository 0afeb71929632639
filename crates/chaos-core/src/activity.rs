use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::ChaosResult;
use crate::report::OutcomeReport;

/// Secret values handed to an activity, looked up before the environment.
pub type Secrets = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Injects a fault.
    Action,
    /// Reads state without changing it.
    Probe,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => write!(f, "action"),
            Self::Probe => write!(f, "probe"),
        }
    }
}

/// Metadata describing an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDescriptor {
    pub name: String,
    pub kind: ActivityKind,
    pub description: String,
    /// How long the activity waits before collecting results when the
    /// caller does not say otherwise.
    #[serde(with = "humantime_serde", default)]
    pub default_duration: Option<Duration>,
}

/// Context passed into an activity run.
#[derive(Debug, Clone, Default)]
pub struct ActivityContext {
    pub targets: Vec<String>,
    /// Parameters from the YAML config for this invocation.
    pub params: serde_yaml::Value,
    /// Overrides the descriptor's default duration.
    pub duration: Option<Duration>,
    pub secrets: Secrets,
}

impl ActivityContext {
    pub fn new(targets: Vec<String>) -> Self {
        Self {
            targets,
            params: serde_yaml::Value::Null,
            duration: None,
            secrets: Secrets::new(),
        }
    }

    pub fn with_params(mut self, params: serde_yaml::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }
}

/// A single action or probe run against a set of targets.
#[async_trait]
pub trait Activity: Send + Sync {
    fn descriptor(&self) -> ActivityDescriptor;

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()>;

    /// Run the activity. Per-target failures are reported in the outcome;
    /// only infrastructure failures come back as errors.
    async fn run(&self, ctx: &ActivityContext) -> ChaosResult<OutcomeReport>;
}
