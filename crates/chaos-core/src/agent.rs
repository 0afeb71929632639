use serde::Serialize;

use crate::activity::{Activity, ActivityDescriptor};

/// An agent exposes the activities it can perform against one control plane.
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Return all activities this agent can perform.
    fn activities(&self) -> Vec<&dyn Activity>;

    /// Look up an activity by name.
    fn activity_by_name(&self, name: &str) -> Option<&dyn Activity> {
        self.activities()
            .into_iter()
            .find(|a| a.descriptor().name == name)
    }

    fn discover(&self) -> Discovery {
        Discovery {
            extension: self.name().to_string(),
            version: self.version().to_string(),
            activities: self.activities().iter().map(|a| a.descriptor()).collect(),
        }
    }
}

/// Machine-readable listing of what an agent offers.
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub extension: String,
    pub version: String,
    pub activities: Vec<ActivityDescriptor>,
}
