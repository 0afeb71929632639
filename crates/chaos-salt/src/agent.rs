use std::path::PathBuf;
use std::sync::Arc;

use chaos_core::activity::{Activity, Secrets};
use chaos_core::agent::Agent;
use chaos_core::error::ChaosResult;

use crate::actions::{SaltAction, ACTIONS};
use crate::client::{RemoteExec, SaltApiClient};
use crate::config::SaltConfig;
use crate::probes::{MinionOnline, ProcessExists, TcInstalled};
use crate::scripts::{BuiltinScripts, DirScripts, ScriptStore};

/// Builds a remote-exec client for one activity run.
pub trait Connector: Send + Sync {
    fn connect(&self, secrets: &Secrets) -> ChaosResult<Arc<dyn RemoteExec>>;
}

/// Connects to the salt-api described by the secrets and `SALTMASTER_*`
/// environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvConnector;

impl Connector for EnvConnector {
    fn connect(&self, secrets: &Secrets) -> ChaosResult<Arc<dyn RemoteExec>> {
        let config = SaltConfig::from_env(secrets)?;
        tracing::debug!(url = %config.url, credentials = ?config.credentials, "Connecting to salt-api");
        Ok(Arc::new(SaltApiClient::new(config)?))
    }
}

/// What every salt activity shares.
pub struct SaltRuntime {
    pub connector: Arc<dyn Connector>,
    pub scripts: Arc<dyn ScriptStore>,
}

pub struct SaltAgent {
    activities: Vec<Box<dyn Activity>>,
}

impl SaltAgent {
    pub fn new(connector: Arc<dyn Connector>, scripts: Arc<dyn ScriptStore>) -> Self {
        let runtime = Arc::new(SaltRuntime { connector, scripts });

        let mut activities: Vec<Box<dyn Activity>> = ACTIONS
            .iter()
            .map(|spec| Box::new(SaltAction::new(spec, runtime.clone())) as Box<dyn Activity>)
            .collect();
        activities.push(Box::new(MinionOnline::new(runtime.clone())));
        activities.push(Box::new(TcInstalled::new(runtime.clone())));
        activities.push(Box::new(ProcessExists::new(runtime)));

        Self { activities }
    }

    /// Agent wired to the environment, reading templates from `scripts_dir`
    /// when given and from the built-in set otherwise.
    pub fn from_env(scripts_dir: Option<PathBuf>) -> Self {
        let scripts: Arc<dyn ScriptStore> = match scripts_dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "Loading script templates from directory");
                Arc::new(DirScripts::new(dir))
            }
            None => Arc::new(BuiltinScripts),
        };
        Self::new(Arc::new(EnvConnector), scripts)
    }
}

impl Agent for SaltAgent {
    fn name(&self) -> &str {
        "chaos-salt"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn activities(&self) -> Vec<&dyn Activity> {
        self.activities.iter().map(|a| a.as_ref()).collect()
    }
}
