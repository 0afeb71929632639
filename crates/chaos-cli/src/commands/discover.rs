use clap::Args;

use chaos_core::activity::ActivityKind;
use chaos_core::agent::Agent;
use chaos_salt::agent::SaltAgent;

#[derive(Args)]
pub struct DiscoverArgs {
    /// Print the discovery document as JSON
    #[arg(long)]
    pub json: bool,
    /// Only list actions or only probes
    #[arg(long, value_parser = ["action", "probe"])]
    pub kind: Option<String>,
}

pub fn execute(args: DiscoverArgs) -> anyhow::Result<()> {
    let agent = SaltAgent::from_env(None);
    let mut discovery = agent.discover();

    if let Some(kind) = args.kind.as_deref() {
        let kind = if kind == "probe" {
            ActivityKind::Probe
        } else {
            ActivityKind::Action
        };
        discovery.activities.retain(|d| d.kind == kind);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&discovery)?);
        return Ok(());
    }

    println!("{} {}", discovery.extension, discovery.version);
    println!();
    println!("{:<26} {:<8} {:<9} {}", "ACTIVITY", "KIND", "DURATION", "DESCRIPTION");
    println!("{}", "-".repeat(80));
    for desc in &discovery.activities {
        let duration = desc
            .default_duration
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<26} {:<8} {:<9} {}",
            desc.name, desc.kind, duration, desc.description
        );
    }

    Ok(())
}
