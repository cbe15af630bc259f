//! QR login against the provider's HTTP endpoints

use laterbridge_client::{QrLoginBridge, QrLoginError, QrOutcome};
use laterbridge_core::CredentialPair;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::provider;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRIGGER: &str = "/api/qr_login/trigger/";
const EXCHANGE: &str = "/api/qr_login/exchange/";

async fn mount_trigger(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(TRIGGER))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pending_polls_then_credentials() {
    let server = MockServer::start().await;
    mount_trigger(
        &server,
        json!({ "session_token": "tok-1", "login_url": "https://login.example.com/q/tok-1" }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(EXCHANGE))
        .and(body_json(json!({ "session_token": "tok-1" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "pending"})))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EXCHANGE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "qr-at",
            "refresh_token": "qr-rt"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bridge = QrLoginBridge::http(provider::http(), provider::shared(&server.uri()));
    let challenge = bridge.start().await.unwrap();
    assert_eq!(challenge.login_url, "https://login.example.com/q/tok-1");

    let outcome = bridge
        .wait(&challenge.session, &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        QrOutcome::Resolved(CredentialPair::new("qr-at", "qr-rt"))
    );
}

#[tokio::test]
async fn test_exchange_errors_do_not_end_polling() {
    let server = MockServer::start().await;
    mount_trigger(&server, json!({ "session_token": "tok-2" })).await;
    Mock::given(method("POST"))
        .and(path(EXCHANGE))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EXCHANGE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "qr-at",
            "refresh": "qr-rt"
        })))
        .mount(&server)
        .await;

    let bridge = QrLoginBridge::http(provider::http(), provider::shared(&server.uri()));
    let challenge = bridge.start().await.unwrap();
    let outcome = bridge
        .wait(&challenge.session, &CancellationToken::new())
        .await;

    assert!(matches!(outcome, QrOutcome::Resolved(_)));
}

#[tokio::test]
async fn test_never_scanned_expires() {
    let server = MockServer::start().await;
    mount_trigger(&server, json!({ "session_token": "tok-3" })).await;
    Mock::given(method("POST"))
        .and(path(EXCHANGE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(20)
        .mount(&server)
        .await;

    let bridge = QrLoginBridge::http(provider::http(), provider::shared(&server.uri()));
    let challenge = bridge.start().await.unwrap();
    let outcome = bridge
        .wait(&challenge.session, &CancellationToken::new())
        .await;

    assert_eq!(outcome, QrOutcome::Expired { attempts: 20 });
}

#[tokio::test]
async fn test_trigger_without_session_token() {
    let server = MockServer::start().await;
    mount_trigger(&server, json!({ "status": "ok" })).await;

    let bridge = QrLoginBridge::http(provider::http(), provider::shared(&server.uri()));
    let err = bridge.start().await.unwrap_err();

    assert!(matches!(err, QrLoginError::IncompleteTrigger(_)));
}

#[tokio::test]
async fn test_trigger_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TRIGGER))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let bridge = QrLoginBridge::http(provider::http(), provider::shared(&server.uri()));
    let err = bridge.start().await.unwrap_err();

    assert!(matches!(err, QrLoginError::Trigger(_)));
}
