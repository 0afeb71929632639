use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChaosError {
    /// Escalated failure of an action or probe, wrapped with the stage prefix
    /// operators look for in experiment journals.
    #[error("failed issuing a execute of shell script via salt API {source}")]
    Activity {
        activity: String,
        #[source]
        source: Box<ChaosError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(#[source] anyhow::Error),

    #[error("remote call failed: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("Cannot find any machines {targets:?}")]
    NoTargets { targets: Vec<String> },

    #[error("Cannot find corresponding script for {operation} on OS: {os}")]
    UnsupportedOs { operation: String, os: String },

    #[error("No script template {file}")]
    MissingScript { file: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChaosError {
    pub fn activity(activity: impl Into<String>, source: ChaosError) -> Self {
        Self::Activity {
            activity: activity.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through any activity wrapper.
    pub fn root(&self) -> &ChaosError {
        match self {
            Self::Activity { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type ChaosResult<T> = Result<T, ChaosError>;
