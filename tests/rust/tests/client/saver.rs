//! Saving URLs to the reading list

use laterbridge_client::ReadLaterClient;
use laterbridge_core::SaveResult;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::provider;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAVE: &str = "/api/library_items/save/";

#[tokio::test]
async fn test_save_makes_exactly_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SAVE))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({ "url": "https://example.com/post" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 4242,
            "content": { "id": "c-77" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let url = Url::parse("https://example.com/post").unwrap();
    let result = client.save_article(&url).await.unwrap();

    assert_eq!(
        result,
        SaveResult {
            id: "4242".to_string(),
            secondary_id: Some("c-77".to_string()),
        }
    );
}

#[tokio::test]
async fn test_save_keeps_provider_id_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SAVE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "00123" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let url = Url::parse("https://example.com/a").unwrap();
    let result = client.save_article(&url).await.unwrap();

    assert_eq!(result.id, "00123");
    assert_eq!(result.secondary_id, None);
}

#[tokio::test]
async fn test_save_rejection_is_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SAVE))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "unsupported"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ReadLaterClient::new(
        provider::http(),
        provider::shared(&server.uri()),
        provider::pair(),
    );
    let url = Url::parse("https://example.com/a").unwrap();
    let err = client.save_article(&url).await.unwrap_err();

    assert_eq!(err.status(), Some(422));
    assert!(!err.is_auth_expired());
}
