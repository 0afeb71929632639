use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use chaos_core::activity::{Activity, ActivityContext, ActivityDescriptor, ActivityKind};
use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::report::{OutcomeReport, TargetOutcome};

use crate::actions::{decode, NoParams};
use crate::agent::SaltRuntime;
use crate::client::{Minions, RemoteExec};
use crate::dispatcher::ExperimentDispatcher;
use crate::scripts::Parameters;

pub const NOT_A_MINION: &str = "Not a Salt Minion";

type Verdict = fn(&str, &Value) -> ChaosResult<(bool, &'static str)>;

/// Run `function` synchronously and classify each requested target's answer.
/// Targets the master did not answer for are reported as not being minions,
/// even when none of them answered.
async fn classify(
    client: &dyn RemoteExec,
    targets: &[String],
    function: &str,
    arg: Option<&str>,
    verdict: Verdict,
) -> ChaosResult<OutcomeReport> {
    let answers: Minions = client.run_sync(targets, function, arg).await?;

    let mut report = OutcomeReport::new();
    for target in targets {
        let (success, summary) = match answers.get(target) {
            Some(value) => verdict(target, value)?,
            None => (false, NOT_A_MINION),
        };
        report.insert(
            target.clone(),
            TargetOutcome {
                success,
                summary: summary.to_string(),
            },
        );
    }
    Ok(report)
}

fn ping_verdict(_target: &str, value: &Value) -> ChaosResult<(bool, &'static str)> {
    Ok(match value {
        Value::Bool(false) => (false, "Offline"),
        _ => (true, "Online"),
    })
}

/// `cmd.run` answers with console text; anything else is a malformed reply.
fn tc_verdict(target: &str, value: &Value) -> ChaosResult<(bool, &'static str)> {
    match value {
        Value::String(out) if out.starts_with("Usage: tc") => Ok((true, "Installed")),
        Value::String(_) => Ok((false, "Not Installed")),
        other => Err(ChaosError::Transport(anyhow::anyhow!(
            "unexpected cmd.run answer from {target}: {other}"
        ))),
    }
}

/// `test.ping` liveness check.
pub struct MinionOnline {
    runtime: Arc<SaltRuntime>,
}

impl MinionOnline {
    pub fn new(runtime: Arc<SaltRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Activity for MinionOnline {
    fn descriptor(&self) -> ActivityDescriptor {
        ActivityDescriptor {
            name: "is_minion_online".into(),
            kind: ActivityKind::Probe,
            description: "Report whether each target answers test.ping".into(),
            default_duration: None,
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        let _: NoParams = decode("is_minion_online", params)?;
        Ok(())
    }

    async fn run(&self, ctx: &ActivityContext) -> ChaosResult<OutcomeReport> {
        let client = self
            .runtime
            .connector
            .connect(&ctx.secrets)
            .map_err(|e| ChaosError::activity("is_minion_online", e))?;
        classify(client.as_ref(), &ctx.targets, "test.ping", None, ping_verdict)
            .await
            .map_err(|e| ChaosError::activity("is_minion_online", e))
    }
}

/// Checks that the iproute2 `tc` tool needed by the network actions exists.
pub struct TcInstalled {
    runtime: Arc<SaltRuntime>,
}

impl TcInstalled {
    pub fn new(runtime: Arc<SaltRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Activity for TcInstalled {
    fn descriptor(&self) -> ActivityDescriptor {
        ActivityDescriptor {
            name: "is_iproute_tc_installed".into(),
            kind: ActivityKind::Probe,
            description: "Report whether the tc command is available on each target".into(),
            default_duration: None,
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        let _: NoParams = decode("is_iproute_tc_installed", params)?;
        Ok(())
    }

    async fn run(&self, ctx: &ActivityContext) -> ChaosResult<OutcomeReport> {
        let client = self
            .runtime
            .connector
            .connect(&ctx.secrets)
            .map_err(|e| ChaosError::activity("is_iproute_tc_installed", e))?;
        classify(
            client.as_ref(),
            &ctx.targets,
            "cmd.run",
            Some("tc -help"),
            tc_verdict,
        )
        .await
        .map_err(|e| ChaosError::activity("is_iproute_tc_installed", e))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrepParams {
    process_name: String,
}

/// Runs the `grep_process_exist` script, which fails when no process
/// matches `process_name`.
pub struct ProcessExists {
    runtime: Arc<SaltRuntime>,
}

impl ProcessExists {
    const SCRIPT: &'static str = "grep_process_exist";
    const WAIT: Duration = Duration::from_secs(1);

    pub fn new(runtime: Arc<SaltRuntime>) -> Self {
        Self { runtime }
    }

    async fn execute(&self, ctx: &ActivityContext) -> ChaosResult<OutcomeReport> {
        let client = self.runtime.connector.connect(&ctx.secrets)?;
        let params: GrepParams = decode(Self::SCRIPT, &ctx.params)?;

        let mut parameters = Parameters::new();
        parameters.insert("param".into(), params.process_name);

        ExperimentDispatcher::new(client.as_ref(), self.runtime.scripts.as_ref())
            .dispatch(Self::SCRIPT, &ctx.targets, Self::WAIT, &parameters)
            .await
    }
}

#[async_trait]
impl Activity for ProcessExists {
    fn descriptor(&self) -> ActivityDescriptor {
        ActivityDescriptor {
            name: Self::SCRIPT.into(),
            kind: ActivityKind::Probe,
            description: "Check that a process named `process_name` is running".into(),
            default_duration: Some(Self::WAIT),
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        let _: GrepParams = decode(Self::SCRIPT, params)?;
        Ok(())
    }

    async fn run(&self, ctx: &ActivityContext) -> ChaosResult<OutcomeReport> {
        self.execute(ctx)
            .await
            .map_err(|e| ChaosError::activity(Self::SCRIPT, e))
    }
}
