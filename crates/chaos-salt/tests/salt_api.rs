// Allow expect/unwrap in tests - they provide clear panic messages on failure
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! HTTP contract tests for the salt-api client and the agent built on it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chaos_core::activity::{ActivityContext, Secrets};
use chaos_core::agent::Agent;
use chaos_core::error::{ChaosError, ChaosResult};
use chaos_salt::agent::{Connector, SaltAgent};
use chaos_salt::client::{JobId, RemoteExec, SaltApiClient};
use chaos_salt::config::{Credentials, SaltConfig, ENV_HOST, ENV_TOKEN};
use chaos_salt::scripts::BuiltinScripts;

// ============================================================================
// Test Infrastructure
// ============================================================================

fn envelope(payload: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "return": [payload] }))
}

fn token_client(server: &MockServer) -> SaltApiClient {
    SaltApiClient::new(SaltConfig::new(
        server.uri(),
        Credentials::Token("tok".into()),
    ))
    .expect("failed to build client")
}

fn password_client(server: &MockServer) -> SaltApiClient {
    SaltApiClient::new(SaltConfig::new(
        server.uri(),
        Credentials::Password {
            username: "saltapi".into(),
            password: "secret".into(),
        },
    ))
    .expect("failed to build client")
}

fn targets(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// Resolves configuration from the activity secrets alone, ignoring the
/// process environment.
struct SecretsConnector;

impl Connector for SecretsConnector {
    fn connect(&self, secrets: &Secrets) -> ChaosResult<Arc<dyn RemoteExec>> {
        let config = SaltConfig::from_secrets(secrets, |_| None)?;
        Ok(Arc::new(SaltApiClient::new(config)?))
    }
}

fn agent() -> SaltAgent {
    SaltAgent::new(Arc::new(SecretsConnector), Arc::new(BuiltinScripts))
}

// ============================================================================
// Client wire contract
// ============================================================================

#[tokio::test]
async fn run_sync_posts_local_list_request_with_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("X-Auth-Token", "tok"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "client": "local",
            "fun": "grains.get",
            "tgt": ["CLIENT1", "CLIENT2"],
            "tgt_type": "list",
            "arg": "kernel",
        })))
        .respond_with(envelope(json!({"CLIENT2": "Windows", "CLIENT1": "Linux"})))
        .expect(1)
        .mount(&server)
        .await;

    let minions = token_client(&server)
        .get_grain(&targets(&["CLIENT1", "CLIENT2"]), "kernel")
        .await
        .unwrap();

    // Master order is preserved.
    let order: Vec<_> = minions.keys().cloned().collect();
    assert_eq!(order, vec!["CLIENT2", "CLIENT1"]);
    assert_eq!(minions["CLIENT1"], json!("Linux"));
}

#[tokio::test]
async fn token_mode_never_logs_in() {
    let server = MockServer::start().await;
    Mock::given(path("/login"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(envelope(json!({"A": true})))
        .expect(2)
        .mount(&server)
        .await;

    let client = token_client(&server);
    client.run_sync(&targets(&["A"]), "test.ping", None).await.unwrap();
    client.run_sync(&targets(&["A"]), "test.ping", None).await.unwrap();
}

#[tokio::test]
async fn password_mode_logs_in_before_every_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({
            "username": "saltapi",
            "password": "secret",
            "eauth": "pam",
        })))
        .respond_with(envelope(json!({"token": "fresh", "user": "saltapi"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("X-Auth-Token", "fresh"))
        .respond_with(envelope(json!({"A": true})))
        .expect(2)
        .mount(&server)
        .await;

    let client = password_client(&server);
    client.run_sync(&targets(&["A"]), "test.ping", None).await.unwrap();
    client.run_sync(&targets(&["A"]), "test.ping", None).await.unwrap();
}

#[tokio::test]
async fn rejected_login_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;
    Mock::given(path("/"))
        .respond_with(envelope(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let err = password_client(&server)
        .run_sync(&targets(&["A"]), "test.ping", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ChaosError::Auth(_)), "{err}");
}

#[tokio::test]
async fn empty_token_fails_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(envelope(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = SaltApiClient::new(SaltConfig::new(server.uri(), Credentials::Token(String::new())))
        .unwrap();
    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, ChaosError::Auth(_)));
}

#[tokio::test]
async fn run_async_targets_one_minion_and_returns_jid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_json(json!({
            "client": "local_async",
            "fun": "cmd.run",
            "tgt": "CLIENT1",
            "tgt_type": "list",
            "arg": "duration='1'\nscript",
        })))
        .respond_with(envelope(json!({"jid": "20190830103239148771", "minions": ["CLIENT1"]})))
        .expect(1)
        .mount(&server)
        .await;

    let jid = token_client(&server)
        .run_async("CLIENT1", "cmd.run", Some("duration='1'\nscript"))
        .await
        .unwrap();
    assert_eq!(jid.as_str(), "20190830103239148771");
}

#[tokio::test]
async fn job_lookups_use_runner_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"client": "runner", "fun": "jobs.exit_success", "jid": "J1"})))
        .respond_with(envelope(json!({"CLIENT1": true, "CLIENT2": false})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!({"client": "runner", "fun": "jobs.lookup_jid", "jid": "J1"})))
        .respond_with(envelope(json!({"CLIENT1": "done -> success"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = token_client(&server);
    let jid = JobId::new("J1");

    let exit = client.get_job_exit_status(&jid).await.unwrap();
    assert_eq!(exit.get("CLIENT1"), Some(&true));
    assert_eq!(exit.get("CLIENT2"), Some(&false));

    let results = client.get_job_result(&jid).await.unwrap();
    assert_eq!(results["CLIENT1"], json!("done -> success"));
}

#[tokio::test]
async fn bad_responses_are_transport_errors() {
    for response in [
        ResponseTemplate::new(500).set_body_string("boom"),
        ResponseTemplate::new(200).set_body_string("<html>not json</html>"),
        ResponseTemplate::new(200).set_body_json(json!({"return": []})),
        ResponseTemplate::new(200).set_body_json(json!({"data": {}})),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(response)
            .mount(&server)
            .await;

        let err = token_client(&server)
            .run_sync(&targets(&["A"]), "test.ping", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChaosError::Transport(_)), "{err}");
    }
}

// ============================================================================
// Agent end-to-end
// ============================================================================

fn secrets_for(server: &MockServer) -> Secrets {
    let mut secrets = Secrets::new();
    secrets.insert(ENV_HOST.into(), server.uri());
    secrets.insert(ENV_TOKEN.into(), "tok".into());
    secrets
}

#[tokio::test]
async fn configuration_error_makes_no_http_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(envelope(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let mut secrets = Secrets::new();
    secrets.insert(ENV_HOST.into(), server.uri());

    let agent = agent();
    let burn = agent.activity_by_name("burn_cpu").unwrap();
    let err = burn
        .run(&ActivityContext::new(targets(&["CLIENT1"])).with_secrets(secrets))
        .await
        .unwrap_err();

    assert!(matches!(err.root(), ChaosError::Config(_)));
    assert!(err
        .to_string()
        .starts_with("failed issuing a execute of shell script via salt API"));
}

#[tokio::test]
async fn burn_cpu_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"client": "local", "fun": "grains.get"})))
        .respond_with(envelope(json!({"CLIENT1": "Linux", "CLIENT2": "Linux"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"client": "local_async", "fun": "cmd.run"})))
        .respond_with(envelope(json!({"jid": "J1"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"fun": "jobs.exit_success"})))
        .respond_with(envelope(json!({"CLIENT1": true, "CLIENT2": true})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"fun": "jobs.lookup_jid"})))
        .respond_with(envelope(json!({
            "CLIENT1": "experiment strees_cpu <CLIENT1> -> success",
            "CLIENT2": "experiment strees_cpu <CLIENT2> -> fail",
        })))
        .expect(2)
        .mount(&server)
        .await;

    let agent = agent();
    let burn = agent.activity_by_name("burn_cpu").unwrap();
    let ctx = ActivityContext::new(targets(&["CLIENT1", "CLIENT2"]))
        .with_duration(Duration::ZERO)
        .with_secrets(secrets_for(&server));
    let report = burn.run(&ctx).await.unwrap();

    assert_eq!(
        report.summary("CLIENT1"),
        Some("Machine CLIENT1 : True - Console: experiment strees_cpu <CLIENT1> -> success")
    );
    assert_eq!(
        report.summary("CLIENT2"),
        Some("Machine CLIENT2 : False - Console: experiment strees_cpu <CLIENT2> -> fail")
    );
}

#[tokio::test]
async fn minion_probe_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "client": "local",
            "fun": "test.ping",
            "tgt": ["A", "B", "C"],
            "tgt_type": "list",
        })))
        .respond_with(envelope(json!({"A": true, "B": false})))
        .expect(1)
        .mount(&server)
        .await;

    let agent = agent();
    let probe = agent.activity_by_name("is_minion_online").unwrap();
    let report = probe
        .run(&ActivityContext::new(targets(&["A", "B", "C"])).with_secrets(secrets_for(&server)))
        .await
        .unwrap();

    assert_eq!(report.summary("A"), Some("Online"));
    assert_eq!(report.summary("B"), Some("Offline"));
    assert_eq!(report.summary("C"), Some("Not a Salt Minion"));
}
