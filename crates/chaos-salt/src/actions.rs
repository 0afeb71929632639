use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use chaos_core::activity::{Activity, ActivityContext, ActivityDescriptor, ActivityKind};
use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::report::OutcomeReport;

use crate::agent::SaltRuntime;
use crate::dispatcher::ExperimentDispatcher;
use crate::scripts::Parameters;

type ShapeFn = fn(&serde_yaml::Value, u64) -> ChaosResult<Parameters>;

/// One fault-injection operation: which script it runs, how long it waits
/// by default, and how its parameters become script variables.
pub struct ActionSpec {
    pub name: &'static str,
    pub script: &'static str,
    pub description: &'static str,
    pub default_duration: u64,
    shape: ShapeFn,
}

impl ActionSpec {
    /// Build the script variables for a run lasting `duration_secs`.
    pub fn parameters(&self, params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
        (self.shape)(params, duration_secs)
    }
}

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "burn_cpu",
        script: "cpu_stress_test",
        description: "Burn CPU up to 100% on the target machines",
        default_duration: 60,
        shape: shape_burn,
    },
    ActionSpec {
        name: "fill_disk",
        script: "fill_disk",
        description: "Fill the disk with a file of `size` MB for the duration",
        default_duration: 120,
        shape: shape_fill_disk,
    },
    ActionSpec {
        name: "burn_io",
        script: "burn_io",
        description: "Increase disk I/O operations per second",
        default_duration: 60,
        shape: shape_burn,
    },
    ActionSpec {
        name: "network_advanced",
        script: "network_advanced",
        description: "Apply a custom tc netem `command`, e.g. 'loss 15%' (Linux only)",
        default_duration: 60,
        shape: shape_network_advanced,
    },
    ActionSpec {
        name: "network_loss",
        script: "network_advanced",
        description: "Drop `loss_ratio` of packets via tc netem (Linux only)",
        default_duration: 60,
        shape: shape_network_loss,
    },
    ActionSpec {
        name: "network_corruption",
        script: "network_advanced",
        description: "Corrupt `corruption_ratio` of packets via tc netem (Linux only)",
        default_duration: 60,
        shape: shape_network_corruption,
    },
    ActionSpec {
        name: "network_latency",
        script: "network_advanced",
        description: "Add `delay` +/- `variance` latency via tc netem (Linux only)",
        default_duration: 60,
        shape: shape_network_latency,
    },
    ActionSpec {
        name: "killall_processes",
        script: "killall_processes",
        description: "Kill every process named `process_name` with optional `signal`",
        default_duration: 60,
        shape: shape_killall_processes,
    },
    ActionSpec {
        name: "kill_process",
        script: "kill_process",
        description: "Kill one process by pid or name with optional `signal`",
        default_duration: 60,
        shape: shape_kill_process,
    },
];

pub fn action_by_name(name: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().find(|a| a.name == name)
}

/// Accept YAML numbers where the script expects text, e.g. `size: 500`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    })
}

/// Decode activity params, treating an absent block as an empty mapping.
pub(crate) fn decode<T: DeserializeOwned>(activity: &str, params: &serde_yaml::Value) -> ChaosResult<T> {
    let value = match params {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
        other => other.clone(),
    };
    serde_yaml::from_value(value)
        .map_err(|e| ChaosError::Config(format!("Invalid {activity} params: {e}")))
}

fn with_duration(duration_secs: u64) -> Parameters {
    let mut p = Parameters::new();
    p.insert("duration".into(), duration_secs.to_string());
    p
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct NoParams {}

fn shape_burn(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let _: NoParams = decode("burn", params)?;
    Ok(with_duration(duration_secs))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FillDiskParams {
    #[serde(default = "default_fill_size", deserialize_with = "string_or_number")]
    size: String,
}

fn default_fill_size() -> String {
    "1000".to_string()
}

fn shape_fill_disk(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let p: FillDiskParams = decode("fill_disk", params)?;
    let mut out = Parameters::new();
    out.insert("execution_duration".into(), duration_secs.to_string());
    out.insert("size".into(), p.size);
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkAdvancedParams {
    #[serde(default)]
    command: String,
}

fn shape_network_advanced(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let p: NetworkAdvancedParams = decode("network_advanced", params)?;
    let mut out = with_duration(duration_secs);
    out.insert("param".into(), p.command);
    Ok(out)
}

fn default_ratio() -> String {
    "5%".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkLossParams {
    #[serde(default = "default_ratio")]
    loss_ratio: String,
}

fn shape_network_loss(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let p: NetworkLossParams = decode("network_loss", params)?;
    let mut out = with_duration(duration_secs);
    out.insert("param".into(), format!("loss {}", p.loss_ratio));
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkCorruptionParams {
    #[serde(default = "default_ratio")]
    corruption_ratio: String,
}

fn shape_network_corruption(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let p: NetworkCorruptionParams = decode("network_corruption", params)?;
    let mut out = with_duration(duration_secs);
    out.insert("param".into(), format!("corrupt {}", p.corruption_ratio));
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkLatencyParams {
    #[serde(default = "default_delay")]
    delay: String,
    #[serde(default = "default_variance")]
    variance: String,
    #[serde(default)]
    ratio: String,
}

fn default_delay() -> String {
    "1000ms".to_string()
}
fn default_variance() -> String {
    "500ms".to_string()
}

fn shape_network_latency(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let p: NetworkLatencyParams = decode("network_latency", params)?;
    let mut out = with_duration(duration_secs);
    out.insert(
        "param".into(),
        format!("delay {} {} {}", p.delay, p.variance, p.ratio),
    );
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KillallParams {
    process_name: String,
    #[serde(default)]
    signal: String,
}

fn shape_killall_processes(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let p: KillallParams = decode("killall_processes", params)?;
    let mut out = with_duration(duration_secs);
    out.insert("param".into(), p.process_name);
    out.insert("signal".into(), p.signal);
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KillProcessParams {
    /// Pid or name accepted by `kill`.
    #[serde(deserialize_with = "string_or_number")]
    process: String,
    #[serde(default)]
    signal: String,
}

fn shape_kill_process(params: &serde_yaml::Value, duration_secs: u64) -> ChaosResult<Parameters> {
    let p: KillProcessParams = decode("kill_process", params)?;
    let mut out = with_duration(duration_secs);
    out.insert("param".into(), p.process);
    out.insert("signal".into(), p.signal);
    Ok(out)
}

/// An [`ActionSpec`] bound to a connector and script store.
pub struct SaltAction {
    spec: &'static ActionSpec,
    runtime: Arc<SaltRuntime>,
}

impl SaltAction {
    pub fn new(spec: &'static ActionSpec, runtime: Arc<SaltRuntime>) -> Self {
        Self { spec, runtime }
    }

    async fn execute(&self, ctx: &ActivityContext) -> ChaosResult<OutcomeReport> {
        let client = self.runtime.connector.connect(&ctx.secrets)?;

        let duration_secs = ctx
            .duration
            .map(|d| d.as_secs())
            .unwrap_or(self.spec.default_duration);
        let params = self.spec.parameters(&ctx.params, duration_secs)?;

        tracing::debug!(
            action = self.spec.name,
            targets = ?ctx.targets,
            duration_secs,
            "Starting action"
        );

        ExperimentDispatcher::new(client.as_ref(), self.runtime.scripts.as_ref())
            .dispatch(
                self.spec.script,
                &ctx.targets,
                Duration::from_secs(duration_secs),
                &params,
            )
            .await
    }
}

#[async_trait]
impl Activity for SaltAction {
    fn descriptor(&self) -> ActivityDescriptor {
        ActivityDescriptor {
            name: self.spec.name.into(),
            kind: ActivityKind::Action,
            description: self.spec.description.into(),
            default_duration: Some(Duration::from_secs(self.spec.default_duration)),
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        self.spec.parameters(params, self.spec.default_duration)?;
        Ok(())
    }

    async fn run(&self, ctx: &ActivityContext) -> ChaosResult<OutcomeReport> {
        self.execute(ctx)
            .await
            .map_err(|e| ChaosError::activity(self.spec.name, e))
    }
}
