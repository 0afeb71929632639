use std::time::Duration;

use serde_json::Value;

use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::report::{OutcomeReport, TargetOutcome};

use crate::client::{JobId, RemoteExec};
use crate::os::{OsFamily, OS_GRAIN};
use crate::scripts::{render_payload, Parameters, ScriptStore};

const EXEC_FUNCTION: &str = "cmd.run";

/// Runs one scripted operation across a set of targets: resolve each
/// target's OS, submit the rendered script asynchronously, wait once for
/// the whole batch, then collect per-target results.
///
/// The wait is a single fixed sleep, not completion polling: jobs still
/// running when it ends are reported with whatever the master has so far.
pub struct ExperimentDispatcher<'a> {
    client: &'a dyn RemoteExec,
    scripts: &'a dyn ScriptStore,
}

struct PlannedJob {
    target: String,
    payload: String,
}

impl<'a> ExperimentDispatcher<'a> {
    pub fn new(client: &'a dyn RemoteExec, scripts: &'a dyn ScriptStore) -> Self {
        Self { client, scripts }
    }

    pub async fn dispatch(
        &self,
        operation: &str,
        targets: &[String],
        duration: Duration,
        parameters: &Parameters,
    ) -> ChaosResult<OutcomeReport> {
        let machines = self.client.get_grain(targets, OS_GRAIN).await?;
        if machines.is_empty() {
            return Err(ChaosError::NoTargets {
                targets: targets.to_vec(),
            });
        }

        // Plan every target before submitting any, so an unsupported OS
        // aborts the batch with nothing started.
        let mut plan = Vec::with_capacity(machines.len());
        for (target, grain) in &machines {
            let os = OsFamily::from_grain(grain);
            let kind = os.script_kind().ok_or_else(|| ChaosError::UnsupportedOs {
                operation: operation.to_string(),
                os: os.to_string(),
            })?;

            let mut params = parameters.clone();
            params.insert("instance_id".to_string(), target.clone());
            let template = self.scripts.load(operation, kind)?;

            plan.push(PlannedJob {
                target: target.clone(),
                payload: render_payload(&params, &template),
            });
        }

        let mut jobs: Vec<(String, JobId)> = Vec::with_capacity(plan.len());
        for job in plan {
            tracing::debug!(operation, minion = %job.target, "Submitting job");
            let jid = self
                .client
                .run_async(&job.target, EXEC_FUNCTION, Some(&job.payload))
                .await?;
            jobs.push((job.target, jid));
        }
        tracing::debug!(
            jids = ?jobs.iter().map(|(t, j)| format!("{t}={j}")).collect::<Vec<_>>(),
            "salt-api returned job ids"
        );

        tracing::info!(operation, duration = ?duration, jobs = jobs.len(), "Waiting for jobs");
        tokio::time::sleep(duration).await;

        let mut report = OutcomeReport::new();
        for (target, jid) in &jobs {
            let outcome = self.collect(target, jid).await;
            if !outcome.success {
                tracing::warn!(operation, minion = %target, jid = %jid, "Target reported failure");
            }
            report.insert(target.clone(), outcome);
        }
        Ok(report)
    }

    /// Poll exit status and console output for one job. Never fails: poll
    /// errors become a failed outcome.
    async fn collect(&self, target: &str, jid: &JobId) -> TargetOutcome {
        let (mut success, status_error) = match self.client.get_job_exit_status(jid).await {
            Ok(statuses) => (statuses.get(target).copied().unwrap_or(false), None),
            Err(e) => {
                tracing::warn!(minion = %target, jid = %jid, error = %e, "Exit status poll failed");
                (false, Some(e.to_string()))
            }
        };

        let mut console = match self.client.get_job_result(jid).await {
            Ok(results) => results.get(target).map(console_text).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(minion = %target, jid = %jid, error = %e, "Result poll failed");
                success = false;
                e.to_string()
            }
        };

        // Scripts report their own verdict in the console text.
        if console.contains("fail") {
            success = false;
        }

        if let Some(err) = status_error {
            console.push_str(&format!(" [exit status unavailable: {err}]"));
        }

        TargetOutcome {
            success,
            summary: format!(
                "Machine {target} : {} - Console: {console}",
                if success { "True" } else { "False" }
            ),
        }
    }
}

fn console_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
