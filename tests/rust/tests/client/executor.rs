//! Refresh-and-retry behavior of authenticated calls

use std::sync::Arc;

use laterbridge_client::{AuthedExecutor, ReadLaterClient};
use laterbridge_core::{CredentialPair, ProviderError};
use pretty_assertions::assert_eq;
use reqwest::Method;
use serde_json::json;
use tests::observers::{FailingObserver, RecordingObserver};
use tests::provider;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = "/api/library_items/queue_feed/";
const REFRESH: &str = "/api/token/refresh/";

async fn mount_feed_for(server: &MockServer, token: &str, status: u16, expect: u64) {
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(provider::page(
            vec![provider::entry(1, "First")],
            None,
        ))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("GET"))
        .and(path(FEED))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(response)
        .expect(expect)
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, from: &str, response: ResponseTemplate, expect: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(body_json(json!({ "refresh_token": from })))
        .respond_with(response)
        .expect(expect)
        .mount(server)
        .await;
}

fn rotated_tokens() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": "access-2",
        "refresh_token": "refresh-2"
    }))
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_valid_token_makes_one_call_and_no_refresh() {
    let server = MockServer::start().await;
    mount_feed_for(&server, "access-1", 200, 1).await;
    mount_refresh(&server, "refresh-1", rotated_tokens(), 0).await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let collection = client.list_articles(10, None).await.unwrap();

    assert_eq!(collection.items.len(), 1);
    assert_eq!(client.credentials(), &provider::pair());
}

// =============================================================================
// 401 handling
// =============================================================================

#[tokio::test]
async fn test_unauthorized_refreshes_once_and_retries_once() {
    let server = MockServer::start().await;
    mount_feed_for(&server, "access-1", 401, 1).await;
    mount_feed_for(&server, "access-2", 200, 1).await;
    mount_refresh(&server, "refresh-1", rotated_tokens(), 1).await;

    let observer = Arc::new(RecordingObserver::default());
    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    )
    .with_observer(observer.clone());

    let collection = client.list_articles(10, None).await.unwrap();

    assert_eq!(collection.items[0].title, "First");
    let expected = CredentialPair::new("access-2", "refresh-2");
    assert_eq!(client.credentials(), &expected);
    assert_eq!(observer.rotations(), vec![expected]);
}

#[tokio::test]
async fn test_observer_failure_does_not_fail_the_call() {
    let server = MockServer::start().await;
    mount_feed_for(&server, "access-1", 401, 1).await;
    mount_feed_for(&server, "access-2", 200, 1).await;
    mount_refresh(&server, "refresh-1", rotated_tokens(), 1).await;

    let observer = Arc::new(FailingObserver::default());
    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    )
    .with_observer(observer.clone());

    let collection = client.list_articles(10, None).await.unwrap();

    assert_eq!(collection.items[0].title, "First");
    assert_eq!(observer.calls(), 1);
    assert_eq!(client.credentials(), &CredentialPair::new("access-2", "refresh-2"));
}

#[tokio::test]
async fn test_rotated_pair_is_used_by_later_calls() {
    let server = MockServer::start().await;
    mount_feed_for(&server, "access-1", 401, 1).await;
    mount_feed_for(&server, "access-2", 200, 2).await;
    mount_refresh(&server, "refresh-1", rotated_tokens(), 1).await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    client.list_articles(10, None).await.unwrap();
    client.list_articles(10, None).await.unwrap();
}

#[tokio::test]
async fn test_second_unauthorized_is_auth_expired() {
    let server = MockServer::start().await;
    mount_feed_for(&server, "access-1", 401, 1).await;
    mount_feed_for(&server, "access-2", 401, 1).await;
    mount_refresh(&server, "refresh-1", rotated_tokens(), 1).await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let err = client.list_articles(10, None).await.unwrap_err();

    assert!(err.is_auth_expired(), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_failed_refresh_is_auth_expired_without_retry() {
    let server = MockServer::start().await;
    mount_feed_for(&server, "access-1", 401, 1).await;
    mount_refresh(
        &server,
        "refresh-1",
        ResponseTemplate::new(400).set_body_json(json!({"detail": "token revoked"})),
        1,
    )
    .await;

    let observer = Arc::new(RecordingObserver::default());
    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    )
    .with_observer(observer.clone());

    let err = client.list_articles(10, None).await.unwrap_err();

    assert!(err.is_auth_expired());
    assert!(observer.rotations().is_empty());
    assert_eq!(client.credentials(), &provider::pair());
}

#[tokio::test]
async fn test_incomplete_refresh_response_is_auth_expired() {
    let server = MockServer::start().await;
    mount_feed_for(&server, "access-1", 401, 1).await;
    mount_refresh(
        &server,
        "refresh-1",
        ResponseTemplate::new(200).set_body_json(json!({ "access_token": "only-access" })),
        1,
    )
    .await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let err = client.list_articles(10, None).await.unwrap_err();

    assert!(err.is_auth_expired());
}

// =============================================================================
// Other failures
// =============================================================================

#[tokio::test]
async fn test_server_error_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "maintenance"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "refresh-1", rotated_tokens(), 0).await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let err = client.list_articles(10, None).await.unwrap_err();

    match err {
        ProviderError::RequestFailed { status, body, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(body, Some(json!({"detail": "maintenance"})));
        }
        other => panic!("expected RequestFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ping/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut executor = AuthedExecutor::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let value = executor
        .execute_target(Method::POST, "ping/", None)
        .await
        .unwrap();

    assert_eq!(value, serde_json::Value::Null);
}
