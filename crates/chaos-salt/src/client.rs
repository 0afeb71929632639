//! Client for the salt-api `rest_cherrypy` netapi.
//!
//! Every call is a JSON POST whose response is wrapped in
//! `{"return": [payload]}`; only the first element is ever used.

use std::fmt;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::{json, Map, Value};

use chaos_core::error::{ChaosError, ChaosResult};

use crate::config::{Credentials, SaltConfig};

const AUTH_HEADER: &str = "X-Auth-Token";

/// Raw per-minion payload, in the order the master returned it.
pub type Minions = Map<String, Value>;

/// Handle of an asynchronously dispatched job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(jid: impl Into<String>) -> Self {
        Self(jid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated session. Threaded into every request rather than
/// stored on the client.
#[derive(Clone)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"***").finish()
    }
}

/// Remote execution against a set of managed machines.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run `function` on `targets` and wait for the per-target results.
    async fn run_sync(
        &self,
        targets: &[String],
        function: &str,
        arg: Option<&str>,
    ) -> ChaosResult<Minions>;

    /// Start `function` on `target` without waiting; returns the job id.
    async fn run_async(&self, target: &str, function: &str, arg: Option<&str>)
        -> ChaosResult<JobId>;

    /// Console output of a finished job, per target.
    async fn get_job_result(&self, job: &JobId) -> ChaosResult<Minions>;

    /// Whether the job exited successfully, per target.
    async fn get_job_exit_status(&self, job: &JobId) -> ChaosResult<IndexMap<String, bool>>;

    async fn get_grain(&self, targets: &[String], grain: &str) -> ChaosResult<Minions> {
        self.run_sync(targets, "grains.get", Some(grain)).await
    }
}

pub struct SaltApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    eauth: String,
}

impl SaltApiClient {
    pub fn new(config: SaltConfig) -> ChaosResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Masters commonly sit behind self-signed certificates.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChaosError::Transport(e.into()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            eauth: config.eauth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Obtain a session. Token mode never touches the network; password mode
    /// logs in every time, since token expiry is not tracked.
    pub async fn authenticate(&self) -> ChaosResult<Session> {
        match &self.credentials {
            Credentials::Token(token) => {
                if token.is_empty() {
                    return Err(ChaosError::Auth(anyhow!("incomplete credentials: empty token")));
                }
                Ok(Session::new(token.clone()))
            }
            Credentials::Password { username, password } => {
                if username.is_empty() {
                    return Err(ChaosError::Auth(anyhow!(
                        "incomplete credentials: empty user name"
                    )));
                }
                let body = json!({
                    "username": username,
                    "password": password,
                    "eauth": self.eauth,
                });
                let url = format!("{}/login", self.base_url);
                let payload = self.post(&url, None, &body).await.map_err(ChaosError::Auth)?;
                let token = payload
                    .get("token")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| ChaosError::Auth(anyhow!("login response carries no token")))?;
                tracing::debug!(user = %username, "Obtained salt-api token");
                Ok(Session::new(token))
            }
        }
    }

    async fn call(&self, body: Value) -> ChaosResult<Value> {
        let session = self.authenticate().await?;
        let url = format!("{}/", self.base_url);
        tracing::debug!(
            client = body["client"].as_str().unwrap_or_default(),
            fun = body["fun"].as_str().unwrap_or_default(),
            "salt-api call"
        );
        self.post(&url, Some(&session), &body)
            .await
            .map_err(ChaosError::Transport)
    }

    async fn post(&self, url: &str, session: Option<&Session>, body: &Value) -> anyhow::Result<Value> {
        let mut request = self.http.post(url).json(body);
        if let Some(session) = session {
            request = request.header(AUTH_HEADER, session.token());
        }

        let resp = request.send().await.with_context(|| format!("POST {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("salt-api error ({status}): {text}");
        }

        let response_body: Value = resp
            .json()
            .await
            .context("salt-api response is not JSON")?;
        unwrap_return(response_body)
    }
}

/// Take the first element of the `return` envelope.
fn unwrap_return(body: Value) -> anyhow::Result<Value> {
    match body {
        Value::Object(mut map) => match map.remove("return") {
            Some(Value::Array(items)) => items
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("empty 'return' in salt-api response")),
            Some(other) => Err(anyhow!("'return' is not an array: {other}")),
            None => Err(anyhow!("missing 'return' in salt-api response")),
        },
        other => Err(anyhow!("unexpected salt-api response: {other}")),
    }
}

fn local_request(client: &str, tgt: Value, function: &str, arg: Option<&str>) -> Value {
    let mut body = json!({
        "client": client,
        "fun": function,
        "tgt": tgt,
        "tgt_type": "list",
    });
    if let Some(arg) = arg.filter(|a| !a.is_empty()) {
        body["arg"] = json!(arg);
    }
    body
}

fn runner_request(function: &str, job: &JobId) -> Value {
    json!({
        "client": "runner",
        "fun": function,
        "jid": job.as_str(),
    })
}

fn into_minions(payload: Value) -> ChaosResult<Minions> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(ChaosError::Transport(anyhow!(
            "expected a per-target mapping, got: {other}"
        ))),
    }
}

#[async_trait]
impl RemoteExec for SaltApiClient {
    async fn run_sync(
        &self,
        targets: &[String],
        function: &str,
        arg: Option<&str>,
    ) -> ChaosResult<Minions> {
        let payload = self
            .call(local_request("local", json!(targets), function, arg))
            .await?;
        into_minions(payload)
    }

    async fn run_async(
        &self,
        target: &str,
        function: &str,
        arg: Option<&str>,
    ) -> ChaosResult<JobId> {
        let payload = self
            .call(local_request("local_async", json!(target), function, arg))
            .await?;
        payload
            .get("jid")
            .and_then(Value::as_str)
            .map(JobId::new)
            .ok_or_else(|| ChaosError::Transport(anyhow!("no 'jid' in async response: {payload}")))
    }

    async fn get_job_result(&self, job: &JobId) -> ChaosResult<Minions> {
        let payload = self.call(runner_request("jobs.lookup_jid", job)).await?;
        into_minions(payload)
    }

    async fn get_job_exit_status(&self, job: &JobId) -> ChaosResult<IndexMap<String, bool>> {
        let payload = self.call(runner_request("jobs.exit_success", job)).await?;
        Ok(into_minions(payload)?
            .into_iter()
            .map(|(target, ok)| (target, ok.as_bool().unwrap_or(false)))
            .collect())
    }
}
