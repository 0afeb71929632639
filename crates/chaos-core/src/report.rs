use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::activity::ActivityKind;

/// Outcome for a single target of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub success: bool,
    /// Human-readable line combining status and console output.
    pub summary: String,
}

/// Per-target outcome of one activity, in the order targets were resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeReport {
    entries: IndexMap<String, TargetOutcome>,
}

impl OutcomeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: impl Into<String>, outcome: TargetOutcome) {
        self.entries.insert(target.into(), outcome);
    }

    pub fn get(&self, target: &str) -> Option<&TargetOutcome> {
        self.entries.get(target)
    }

    /// Summary text for `target`, if it was reported.
    pub fn summary(&self, target: &str) -> Option<&str> {
        self.entries.get(target).map(|o| o.summary.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TargetOutcome)> {
        self.entries.iter()
    }

    pub fn targets(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.values().all(|o| o.success)
    }

    pub fn failures(&self) -> usize {
        self.entries.values().filter(|o| !o.success).count()
    }

    /// Flatten into the `target -> summary` mapping handed back to callers.
    pub fn to_summary_map(&self) -> IndexMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.summary.clone()))
            .collect()
    }
}

/// Record of a single activity step within an experiment.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub activity: String,
    pub kind: ActivityKind,
    pub duration: Duration,
    pub outcome: Option<OutcomeReport>,
    pub error: Option<String>,
}

impl ActivityRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.outcome.as_ref().is_some_and(|o| o.all_succeeded())
    }
}

/// Complete post-experiment report.
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub experiment_id: Uuid,
    pub experiment_name: String,
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_duration: Duration,

    pub activities: Vec<ActivityRecord>,
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{mins}m {secs}s")
    } else {
        let millis = d.as_millis();
        if millis < 1000 {
            format!("{millis}ms")
        } else {
            format!("{}.{}s", total_secs, d.subsec_millis() / 100)
        }
    }
}

impl fmt::Display for ExperimentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bar = "=".repeat(72);
        let thin = "-".repeat(72);

        writeln!(f, "\n{bar}")?;
        writeln!(f, "  EXPERIMENT REPORT")?;
        writeln!(f, "{bar}\n")?;

        writeln!(f, "  Name:     {}", self.experiment_name)?;
        writeln!(f, "  ID:       {}", self.experiment_id)?;
        writeln!(f, "  Status:   {}", self.status)?;
        writeln!(f, "  Duration: {}", format_duration(self.total_duration))?;

        writeln!(f, "\n{thin}")?;
        writeln!(f, "  ACTIVITIES ({})", self.activities.len())?;
        writeln!(f, "{thin}\n")?;
        if self.activities.is_empty() {
            writeln!(f, "  (none)")?;
        } else {
            writeln!(
                f,
                "  {:<4} {:<22} {:<7} {:<8} {}",
                "#", "ACTIVITY", "KIND", "RESULT", "DURATION"
            )?;
            for (i, a) in self.activities.iter().enumerate() {
                let result = if a.succeeded() { "OK" } else { "FAILED" };
                writeln!(
                    f,
                    "  {:<4} {:<22} {:<7} {:<8} {}",
                    i + 1,
                    a.activity,
                    a.kind,
                    result,
                    format_duration(a.duration)
                )?;
                if let Some(ref err) = a.error {
                    writeln!(f, "       -> {err}")?;
                }
                if let Some(ref outcome) = a.outcome {
                    for (target, o) in outcome.iter() {
                        let mark = if o.success { "+" } else { "!" };
                        writeln!(f, "       {mark} {target}: {}", o.summary.trim_end())?;
                    }
                }
            }
        }

        writeln!(f, "\n{thin}")?;
        writeln!(f, "  TIMELINE")?;
        writeln!(f, "{thin}\n")?;
        writeln!(
            f,
            "  Started:    {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "  Completed:  {}",
            self.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;

        writeln!(f, "\n{bar}")?;

        Ok(())
    }
}
