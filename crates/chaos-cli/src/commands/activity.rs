use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use chaos_core::activity::{ActivityContext, Secrets};
use chaos_core::agent::Agent;
use chaos_salt::agent::SaltAgent;

#[derive(Args)]
pub struct ActivityArgs {
    /// Name of the action or probe, e.g. burn_cpu or is_minion_online
    pub name: String,
    /// Target minion id (repeatable)
    #[arg(short, long = "target", required = true)]
    pub targets: Vec<String>,
    /// Activity parameter as key=value (repeatable)
    #[arg(short, long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,
    /// How long to wait before collecting results, e.g. 30s or 2m
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub duration: Option<Duration>,
    /// Read script templates from this directory instead of the built-in set
    #[arg(long)]
    pub scripts_dir: Option<PathBuf>,
    /// Print the outcome map as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

pub async fn execute(args: ActivityArgs) -> anyhow::Result<()> {
    let agent = SaltAgent::from_env(args.scripts_dir);
    let activity = agent
        .activity_by_name(&args.name)
        .with_context(|| format!("unknown activity '{}'", args.name))?;

    let mut params = serde_yaml::Mapping::new();
    for (key, value) in args.params {
        params.insert(serde_yaml::Value::String(key), serde_yaml::Value::String(value));
    }
    let params = serde_yaml::Value::Mapping(params);
    activity.validate_params(&params)?;

    let mut ctx = ActivityContext::new(args.targets)
        .with_params(params)
        .with_secrets(Secrets::new());
    if let Some(duration) = args.duration {
        ctx = ctx.with_duration(duration);
    }

    tracing::info!(activity = %args.name, targets = ?ctx.targets, "Running activity");
    let report = activity.run(&ctx).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_summary_map())?);
    } else {
        for (target, outcome) in report.iter() {
            println!("{target}: {}", outcome.summary.trim_end());
        }
    }

    if !report.all_succeeded() {
        anyhow::bail!("{} of {} target(s) failed", report.failures(), report.len());
    }
    Ok(())
}
