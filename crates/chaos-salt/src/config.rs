use std::time::Duration;

use chaos_core::activity::Secrets;
use chaos_core::error::{ChaosError, ChaosResult};

pub const ENV_HOST: &str = "SALTMASTER_HOST";
pub const ENV_USER: &str = "SALTMASTER_USER";
pub const ENV_PASSWORD: &str = "SALTMASTER_PASSWORD";
pub const ENV_TOKEN: &str = "SALTMASTER_TOKEN";
pub const ENV_EAUTH: &str = "SALTMASTER_EAUTH";
pub const ENV_TIMEOUT: &str = "SALTMASTER_TIMEOUT";

const DEFAULT_HOST: &str = "http://localhost";
const DEFAULT_EAUTH: &str = "pam";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the client proves its identity to the salt-api.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Log in before every call and use the returned token.
    Password { username: String, password: String },
    /// Use this token as-is; never call login.
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltConfig {
    pub url: String,
    pub credentials: Credentials,
    /// External auth backend passed to `/login`.
    pub eauth: String,
    pub request_timeout: Duration,
}

impl SaltConfig {
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            credentials,
            eauth: DEFAULT_EAUTH.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Resolve the configuration from `secrets`, falling back to the process
    /// environment for anything the secrets don't hold.
    pub fn from_env(secrets: &Secrets) -> ChaosResult<Self> {
        Self::from_secrets(secrets, |k| std::env::var(k).ok())
    }

    /// Resolve the configuration, looking each key up in `secrets` before `env`.
    ///
    /// A user name selects password mode even when a token is also present.
    pub fn from_secrets<F>(secrets: &Secrets, env: F) -> ChaosResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |k: &str| secrets.get(k).cloned().or_else(|| env(k));

        let url = lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());

        let credentials = if let Some(username) = lookup(ENV_USER) {
            Credentials::Password {
                username,
                password: lookup(ENV_PASSWORD).unwrap_or_default(),
            }
        } else if let Some(token) = lookup(ENV_TOKEN) {
            Credentials::Token(token)
        } else {
            return Err(ChaosError::Config(
                "configuration is not complete, either use user/pass or a token!".into(),
            ));
        };

        let mut config = Self::new(url, credentials);
        if let Some(eauth) = lookup(ENV_EAUTH) {
            config.eauth = eauth;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|e| {
                ChaosError::Config(format!("Invalid {ENV_TIMEOUT} '{raw}': {e}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn missing_credentials_is_a_configuration_error() {
        let err = SaltConfig::from_secrets(&Secrets::new(), env_of(&[(ENV_HOST, "https://salt")]))
            .unwrap_err();
        assert!(matches!(err, ChaosError::Config(_)));
        assert!(err.to_string().contains("configuration is not complete"));
    }

    #[test]
    fn secrets_take_precedence_over_env() {
        let mut secrets = Secrets::new();
        secrets.insert(ENV_HOST.into(), "https://from-secrets:8000".into());
        secrets.insert(ENV_TOKEN.into(), "secret-token".into());

        let config = SaltConfig::from_secrets(
            &secrets,
            env_of(&[(ENV_HOST, "https://from-env"), (ENV_TOKEN, "env-token")]),
        )
        .unwrap();

        assert_eq!(config.url, "https://from-secrets:8000");
        assert_eq!(config.credentials, Credentials::Token("secret-token".into()));
        assert_eq!(config.eauth, "pam");
    }

    #[test]
    fn user_wins_over_token() {
        let config = SaltConfig::from_secrets(
            &Secrets::new(),
            env_of(&[
                (ENV_USER, "salt"),
                (ENV_PASSWORD, "abcd1234"),
                (ENV_TOKEN, "tok"),
                (ENV_EAUTH, "ldap"),
                (ENV_TIMEOUT, "5"),
            ]),
        )
        .unwrap();

        assert_eq!(config.url, DEFAULT_HOST);
        assert_eq!(
            config.credentials,
            Credentials::Password {
                username: "salt".into(),
                password: "abcd1234".into()
            }
        );
        assert_eq!(config.eauth, "ldap");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = SaltConfig::from_secrets(
            &Secrets::new(),
            env_of(&[(ENV_TOKEN, "tok"), (ENV_TIMEOUT, "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::Password {
            username: "salt".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
