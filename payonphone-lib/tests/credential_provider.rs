//! Integration tests for the HTTP connection token provider.
//!
//! ```bash
//! cargo test -p payonphone-lib --features http-provider --test credential_provider
//! ```

#![cfg(feature = "http-provider")]

use payonphone_lib::runtime::{SimulatedOperation, SimulatedTerminal};
use payonphone_lib::{
    BackendConfig, ConnectionStatus, ConnectionTokenProvider, DeviceSession, HttpTokenProvider,
    TerminalConfig, TerminalError,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn provider_for(server: &MockServer) -> HttpTokenProvider {
    HttpTokenProvider::new(BackendConfig::new(server.uri()).with_timeout(2)).unwrap()
}

#[tokio::test]
async fn test_fetch_connection_token() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connection_token"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secret": "pst_test_YWNjdF8xMjM"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).await;
    let token = provider.fetch_connection_token().await.unwrap();
    assert_eq!(token.secret(), "pst_test_YWNjdF8xMjM");
}

#[tokio::test]
async fn test_each_fetch_hits_backend() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connection_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secret": "pst_test_abc"
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).await;
    provider.fetch_connection_token().await.unwrap();
    provider.fetch_connection_token().await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_credential_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connection_token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("stripe unavailable"))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).await;
    let err = provider.fetch_connection_token().await.unwrap_err();
    match err {
        TerminalError::CredentialFetch { reason } => {
            assert!(reason.contains("500"));
            assert!(reason.contains("stripe unavailable"));
        }
        other => panic!("expected credential failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_secret_is_credential_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connection_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "no secret here"
        })))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).await;
    let err = provider.fetch_connection_token().await.unwrap_err();
    assert!(matches!(err, TerminalError::CredentialFetch { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_empty_secret_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connection_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secret": ""
        })))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).await;
    let err = provider.fetch_connection_token().await.unwrap_err();
    assert!(matches!(err, TerminalError::CredentialFetch { .. }));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connection_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "secret": "pst_late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let provider = HttpTokenProvider::new(BackendConfig::new(mock_server.uri()).with_timeout(1))
        .unwrap();
    let err = provider.fetch_connection_token().await.unwrap_err();
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_health_check() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "timestamp": "2024-05-01T12:00:00.000Z"
        })))
        .mount(&mock_server)
        .await;

    let provider = provider_for(&mock_server).await;
    let health = provider.check_health().await.unwrap();
    assert!(health.is_ok());
}

#[tokio::test]
async fn test_backend_failure_blocks_connect() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/connection_token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let sim = SimulatedTerminal::new();
    let session = DeviceSession::new(
        sim.clone(),
        Arc::new(provider_for(&mock_server).await),
        TerminalConfig::new("tml_test_location").simulated(),
    );

    let reader = sim.config().readers[0].clone();
    let err = session.connect_to_reader(reader).await.unwrap_err();
    assert!(matches!(err, TerminalError::CredentialFetch { .. }));
    assert_eq!(
        session.snapshot().connection_status,
        ConnectionStatus::NotConnected
    );
    assert_eq!(sim.calls(SimulatedOperation::Connect), 1);
    assert!(sim.connected_reader().is_none());
}
