use std::sync::Arc;
use tokio::time::Instant;

use crate::agent::Agent;
use crate::error::{ChaosError, ChaosResult};
use crate::event::{EventSink, ExperimentEvent};
use crate::experiment::{Experiment, ExperimentConfig, ExperimentStatus};
use crate::report::{ActivityRecord, ExperimentReport};

pub struct Orchestrator {
    agent: Arc<dyn Agent>,
    event_sinks: Vec<Arc<dyn EventSink>>,
}

impl Orchestrator {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            event_sinks: Vec::new(),
        }
    }

    pub fn add_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.event_sinks.push(sink);
    }

    async fn emit(&self, event: ExperimentEvent) {
        for sink in &self.event_sinks {
            sink.emit(event.clone()).await;
        }
    }

    /// Check every step names a known activity with valid params.
    pub fn validate(&self, config: &ExperimentConfig) -> ChaosResult<()> {
        for step in &config.method {
            let activity = self.agent.activity_by_name(&step.activity).ok_or_else(|| {
                ChaosError::Config(format!("Unknown activity: {}", step.activity))
            })?;
            activity.validate_params(&step.params)?;
            if step.targets.as_ref().unwrap_or(&config.targets).is_empty() {
                return Err(ChaosError::Config(format!(
                    "Activity '{}' has no targets",
                    step.activity
                )));
            }
        }
        Ok(())
    }

    /// Run a single experiment's steps in order.
    ///
    /// A step that escalates an error stops the experiment; the report still
    /// comes back with the failure recorded against that step.
    pub async fn run_experiment(&self, config: ExperimentConfig) -> ChaosResult<ExperimentReport> {
        self.validate(&config)?;

        let mut experiment = Experiment::new(config);
        let experiment_id = experiment.id;
        let started = Instant::now();
        let started_at = chrono::Utc::now();
        experiment.started_at = Some(started_at);
        experiment.status = ExperimentStatus::Running;

        self.emit(ExperimentEvent::Started {
            experiment_id,
            at: started_at,
        })
        .await;

        let mut records = Vec::with_capacity(experiment.config.method.len());

        for step in &experiment.config.method {
            let activity = self.agent.activity_by_name(&step.activity).ok_or_else(|| {
                ChaosError::Config(format!("Unknown activity: {}", step.activity))
            })?;
            let descriptor = activity.descriptor();
            let ctx = step.context(&experiment.config);

            self.emit(ExperimentEvent::ActivityStarted {
                experiment_id,
                activity: step.activity.clone(),
                targets: ctx.targets.len(),
            })
            .await;
            tracing::info!(
                activity = %step.activity,
                kind = %descriptor.kind,
                targets = ctx.targets.len(),
                "Running activity"
            );

            let step_started = Instant::now();
            let result = activity.run(&ctx).await;
            let elapsed = step_started.elapsed();

            match result {
                Ok(outcome) => {
                    let failed_targets = outcome.failures();
                    tracing::info!(
                        activity = %step.activity,
                        failed_targets,
                        "Activity completed"
                    );
                    self.emit(ExperimentEvent::ActivityCompleted {
                        experiment_id,
                        activity: step.activity.clone(),
                        failed_targets,
                    })
                    .await;
                    records.push(ActivityRecord {
                        activity: step.activity.clone(),
                        kind: descriptor.kind,
                        duration: elapsed,
                        outcome: Some(outcome),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::error!(activity = %step.activity, error = %e, "Activity failed, aborting experiment");
                    self.emit(ExperimentEvent::Failed {
                        experiment_id,
                        error: e.to_string(),
                    })
                    .await;
                    experiment.status = ExperimentStatus::Failed(e.to_string());
                    records.push(ActivityRecord {
                        activity: step.activity.clone(),
                        kind: descriptor.kind,
                        duration: elapsed,
                        outcome: None,
                        error: Some(e.to_string()),
                    });
                    break;
                }
            }

            if let Some(pause) = step.pause_after {
                self.emit(ExperimentEvent::PauseBegin {
                    experiment_id,
                    duration: pause,
                })
                .await;
                tracing::info!(duration = ?pause, "Pausing after activity");
                tokio::time::sleep(pause).await;
            }
        }

        let completed_at = chrono::Utc::now();
        experiment.completed_at = Some(completed_at);
        if experiment.status == ExperimentStatus::Running {
            experiment.status = ExperimentStatus::Completed;
            self.emit(ExperimentEvent::Completed {
                experiment_id,
                at: completed_at,
            })
            .await;
        }

        let status = match &experiment.status {
            ExperimentStatus::Completed if records.iter().all(|r| r.succeeded()) => "Completed",
            ExperimentStatus::Completed => "Completed with failed targets",
            _ => "Failed",
        };

        Ok(ExperimentReport {
            experiment_id,
            experiment_name: experiment.config.name.clone(),
            status: status.to_string(),
            started_at,
            completed_at,
            total_duration: started.elapsed(),
            activities: records,
        })
    }
}
