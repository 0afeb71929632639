use std::path::PathBuf;

use clap::Args;

use chaos_core::agent::Agent;
use chaos_core::config::ChaosConfig;
use chaos_salt::agent::SaltAgent;

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to config file to validate
    pub config: PathBuf,
}

pub fn execute(args: ValidateArgs) -> anyhow::Result<()> {
    println!("Validating {}...", args.config.display());

    let config = ChaosConfig::from_file(&args.config)?;
    println!("  YAML parsing: OK");
    println!("  Experiments found: {}", config.experiments.len());

    let agent = SaltAgent::from_env(None);
    let mut errors = Vec::new();

    for (i, experiment) in config.experiments.iter().enumerate() {
        println!("\n  Experiment #{}: '{}'", i + 1, experiment.name);
        println!("    Targets: {:?}", experiment.targets);
        println!("    Steps: {}", experiment.method.len());

        for step in &experiment.method {
            let Some(activity) = agent.activity_by_name(&step.activity) else {
                println!("    Activity '{}': NOT FOUND", step.activity);
                errors.push(format!(
                    "Experiment '{}': unknown activity '{}'",
                    experiment.name, step.activity
                ));
                continue;
            };

            if let Err(e) = activity.validate_params(&step.params) {
                println!("    Activity '{}': INVALID - {e}", step.activity);
                errors.push(format!(
                    "Experiment '{}', activity '{}': invalid params: {e}",
                    experiment.name, step.activity
                ));
                continue;
            }

            if step.targets.as_ref().unwrap_or(&experiment.targets).is_empty() {
                println!("    Activity '{}': NO TARGETS", step.activity);
                errors.push(format!(
                    "Experiment '{}', activity '{}': no targets",
                    experiment.name, step.activity
                ));
                continue;
            }

            println!(
                "    Activity '{}' ({}): OK",
                step.activity,
                activity.descriptor().kind
            );
        }
    }

    println!();
    if errors.is_empty() {
        println!("Validation PASSED");
    } else {
        println!("Validation FAILED with {} error(s):", errors.len());
        for err in &errors {
            eprintln!("  - {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}
