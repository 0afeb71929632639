use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use chaos_core::config::ChaosConfig;
use chaos_core::event::TracingEventSink;
use chaos_core::orchestrator::Orchestrator;
use chaos_salt::agent::SaltAgent;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the experiment YAML config file
    pub config: PathBuf,
    /// Dry-run mode: validate every step but don't execute
    #[arg(long)]
    pub dry_run: bool,
    /// Read script templates from this directory instead of the built-in set
    #[arg(long)]
    pub scripts_dir: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = ChaosConfig::from_file(&args.config)?;

    tracing::info!(
        experiments = config.experiments.len(),
        "Loaded configuration"
    );

    let mut orchestrator = Orchestrator::new(Arc::new(SaltAgent::from_env(args.scripts_dir)));
    orchestrator.add_event_sink(Arc::new(TracingEventSink));

    for experiment in &config.experiments {
        orchestrator.validate(experiment)?;
    }

    if args.dry_run {
        tracing::info!("Dry-run mode: validating configuration only");
        for experiment in &config.experiments {
            tracing::info!(
                name = %experiment.name,
                targets = ?experiment.targets,
                steps = experiment.method.len(),
                "Experiment validated"
            );
        }
        println!("Configuration is valid.");
        return Ok(());
    }

    let mut failed = 0;
    for experiment in config.experiments {
        let name = experiment.name.clone();
        tracing::info!(name = %name, "Starting experiment");
        match orchestrator.run_experiment(experiment).await {
            Ok(report) => {
                println!("{report}");
                if report.status == "Failed" {
                    failed += 1;
                }
            }
            Err(e) => {
                eprintln!("Experiment '{name}' failed: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} experiment(s) failed");
    }
    Ok(())
}
