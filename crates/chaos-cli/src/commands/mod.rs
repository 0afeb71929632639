use clap::Subcommand;

pub mod activity;
pub mod discover;
pub mod run;
pub mod validate;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the chaos experiments in a config file
    Run(run::RunArgs),
    /// Run a single action or probe against some targets
    Activity(activity::ActivityArgs),
    /// List the available actions and probes
    Discover(discover::DiscoverArgs),
    /// Validate a config file without executing
    Validate(validate::ValidateArgs),
}
