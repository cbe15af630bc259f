//! MCP over Streamable HTTP: credential challenge and tool calls

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use laterbridge_core::CredentialPair;
use laterbridge_gateway::logging::TraceContext;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tests::provider;
use tower::ServiceExt;
use wiremock::matchers::{header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{gateway, send, UNUSED_PROVIDER};

const FEED: &str = "/api/library_items/queue_feed/";

fn rpc() -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header(header::HOST, "localhost")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream")
}

fn with_headers(pair: &CredentialPair, body: Value) -> Request<Body> {
    rpc()
        .header("x-access-token", pair.access())
        .header("x-refresh-token", pair.refresh())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

/// First JSON-RPC response in the body, which is either plain JSON or an
/// event stream of `data:` lines
async fn rpc_response(router: &Router, request: Request<Body>) -> Value {
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();
    let mut buffered = String::new();

    loop {
        let frame = tokio::time::timeout(Duration::from_secs(10), body.frame())
            .await
            .expect("MCP response timed out");
        let Some(frame) = frame else { break };
        if let Ok(data) = frame.unwrap().into_data() {
            buffered.push_str(&String::from_utf8_lossy(&data));
        }
        if let Some(message) = find_message(&buffered) {
            return message;
        }
    }
    find_message(&buffered).unwrap_or_else(|| panic!("no JSON-RPC response in {:?}", buffered))
}

fn find_message(buffered: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(buffered.trim()) {
        return Some(value);
    }
    buffered
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .find(|value| value.get("id").is_some())
}

fn result_text(message: &Value) -> String {
    message["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("no text content in {}", message))
        .to_string()
}

fn is_error(message: &Value) -> bool {
    message["result"]["isError"].as_bool().unwrap_or(false)
}

// =============================================================================
// Credential challenge
// =============================================================================

#[tokio::test]
async fn test_missing_credentials_get_a_challenge() {
    let router = gateway(UNUSED_PROVIDER).router();
    let body = tool_call(1, "list_articles", json!({}));
    let request = rpc().body(Body::from(body.to_string())).unwrap();

    let (status, headers, _) = send(&router, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let challenge = headers
        .get(header::WWW_AUTHENTICATE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(challenge.starts_with("Bearer "));
    assert!(challenge.contains(
        r#"resource_metadata="http://localhost:8931/.well-known/oauth-protected-resource/mcp""#
    ));
    assert!(!challenge.contains("invalid_token"));
}

#[tokio::test]
async fn test_foreign_bearer_is_invalid_token() {
    let router = gateway(UNUSED_PROVIDER).router();
    let body = tool_call(1, "list_articles", json!({}));
    let request = rpc()
        .header(header::AUTHORIZATION, "Bearer not-one-of-ours")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, headers, _) = send(&router, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let challenge = headers.get(header::WWW_AUTHENTICATE).unwrap().to_str().unwrap();
    assert!(challenge.contains(r#"error="invalid_token""#));
}

#[tokio::test]
async fn test_half_a_pair_is_rejected() {
    let router = gateway(UNUSED_PROVIDER).router();
    let body = tool_call(1, "list_articles", json!({}));
    let request = rpc()
        .header("x-access-token", "only-access")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _, _) = send(&router, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Tool calls
// =============================================================================

#[tokio::test]
async fn test_tools_list() {
    let router = gateway(UNUSED_PROVIDER).router();
    let request = with_headers(
        &provider::pair(),
        json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {} }),
    );

    let message = rpc_response(&router, request).await;

    let mut names: Vec<String> = message["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["get_article", "list_articles", "save_article"]);
}

#[tokio::test]
async fn test_request_trace_carries_rpc_method_and_token_fingerprint() {
    let router = gateway(UNUSED_PROVIDER).router();
    let pair = provider::pair();
    let request = with_headers(
        &pair,
        json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {} }),
    );

    let response = router.clone().oneshot(request).await.unwrap();

    let ctx = response.extensions().get::<TraceContext>().unwrap();
    assert_eq!(ctx.path, "/mcp");
    assert_eq!(ctx.mcp_method.as_deref(), Some("tools/list"));
    assert_eq!(ctx.principal.as_deref(), Some(pair.fingerprint().as_str()));
    assert!(!ctx.principal_or_anon().contains(pair.access()));
}

#[tokio::test]
async fn test_list_articles_with_header_credentials() {
    let provider_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED))
        .and(header_is("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider::page(
            vec![provider::entry(1, "Rust in Production"), provider::entry(2, "Async Drop")],
            Some("next-page"),
        )))
        .expect(1)
        .mount(&provider_server)
        .await;
    let router = gateway(&provider_server.uri()).router();

    let message = rpc_response(
        &router,
        with_headers(&provider::pair(), tool_call(7, "list_articles", json!({ "limit": 2 }))),
    )
    .await;

    assert_eq!(message["id"], 7);
    assert!(!is_error(&message));
    let text = result_text(&message);
    assert!(text.contains("Rust in Production"), "{}", text);
    assert!(text.contains("Async Drop"), "{}", text);
    assert!(text.contains("next-page"), "{}", text);
}

#[tokio::test]
async fn test_bearer_envelope_reaches_provider_with_inner_pair() {
    let provider_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED))
        .and(header_is("authorization", "Bearer provider-at"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(provider::page(vec![provider::entry(5, "Sealed")], None)),
        )
        .expect(1)
        .mount(&provider_server)
        .await;
    let server = gateway(&provider_server.uri());
    let bearer = server
        .state()
        .sealer
        .seal_access(&CredentialPair::new("provider-at", "provider-rt"))
        .unwrap();
    let router = server.router();

    let body = tool_call(3, "get_article", json!({ "article_id": "5" }));
    let request = rpc()
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .body(Body::from(body.to_string()))
        .unwrap();
    let message = rpc_response(&router, request).await;

    assert!(!is_error(&message));
    let text = result_text(&message);
    assert!(text.starts_with("# Sealed"), "{}", text);
    assert!(text.contains("quote from 5"), "{}", text);
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_inside_the_call() {
    let provider_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED))
        .and(header_is("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&provider_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2"
        })))
        .expect(1)
        .mount(&provider_server)
        .await;
    Mock::given(method("GET"))
        .and(path(FEED))
        .and(header_is("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider::page(vec![], None)))
        .expect(1)
        .mount(&provider_server)
        .await;
    let router = gateway(&provider_server.uri()).router();

    let message = rpc_response(
        &router,
        with_headers(&provider::pair(), tool_call(2, "list_articles", json!({}))),
    )
    .await;

    assert!(!is_error(&message));
    assert_eq!(result_text(&message), "No articles found.\n");
}

#[tokio::test]
async fn test_rejected_credentials_are_a_tool_error() {
    let provider_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FEED))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&provider_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2"
        })))
        .expect(1)
        .mount(&provider_server)
        .await;
    let router = gateway(&provider_server.uri()).router();

    let message = rpc_response(
        &router,
        with_headers(&provider::pair(), tool_call(4, "list_articles", json!({}))),
    )
    .await;

    assert!(is_error(&message));
}

#[tokio::test]
async fn test_save_article_rejects_non_http_url_without_calling_provider() {
    let provider_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/library_items/save/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .expect(0)
        .mount(&provider_server)
        .await;
    let router = gateway(&provider_server.uri()).router();

    let message = rpc_response(
        &router,
        with_headers(
            &provider::pair(),
            tool_call(5, "save_article", json!({ "url": "ftp://example.com/file" })),
        ),
    )
    .await;

    assert!(is_error(&message));
}

#[tokio::test]
async fn test_save_article() {
    let provider_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/library_items/save/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 314 })))
        .expect(1)
        .mount(&provider_server)
        .await;
    let router = gateway(&provider_server.uri()).router();

    let message = rpc_response(
        &router,
        with_headers(
            &provider::pair(),
            tool_call(6, "save_article", json!({ "url": "https://example.com/new" })),
        ),
    )
    .await;

    assert!(!is_error(&message));
    assert_eq!(result_text(&message), "Saved https://example.com/new (ID: 314)");
}
