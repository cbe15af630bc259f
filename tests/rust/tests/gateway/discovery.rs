//! Discovery documents, client registration, health and rate limits

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::{gateway, get, json_body, send, UNUSED_PROVIDER};

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_authorization_server_metadata() {
    let router = gateway(UNUSED_PROVIDER).router();

    for path in [
        "/.well-known/oauth-authorization-server",
        "/.well-known/oauth-authorization-server/mcp",
    ] {
        let (status, _, body) = send(&router, get(path)).await;
        assert_eq!(status, StatusCode::OK, "{}", path);

        let metadata = json_body(&body);
        assert_eq!(metadata["issuer"], "http://localhost:8931");
        assert_eq!(metadata["authorization_endpoint"], "http://localhost:8931/authorize");
        assert_eq!(metadata["token_endpoint"], "http://localhost:8931/token");
        assert_eq!(metadata["registration_endpoint"], "http://localhost:8931/register");
        assert_eq!(metadata["code_challenge_methods_supported"], json!(["S256", "plain"]));
        assert_eq!(metadata["token_endpoint_auth_methods_supported"], json!(["none"]));
    }
}

#[tokio::test]
async fn test_protected_resource_metadata() {
    let router = gateway(UNUSED_PROVIDER).router();

    let (status, _, body) = send(&router, get("/.well-known/oauth-protected-resource/mcp")).await;

    assert_eq!(status, StatusCode::OK);
    let metadata = json_body(&body);
    assert_eq!(metadata["resource"], "http://localhost:8931/mcp");
    assert_eq!(metadata["authorization_servers"], json!(["http://localhost:8931"]));
    assert_eq!(metadata["bearer_methods_supported"], json!(["header"]));
}

#[tokio::test]
async fn test_health() {
    let router = gateway(UNUSED_PROVIDER).router();

    let (status, _, body) = send(&router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "ok");
}

// =============================================================================
// Dynamic client registration
// =============================================================================

fn register_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_register_echoes_client_metadata() {
    let router = gateway(UNUSED_PROVIDER).router();

    let (status, _, body) = send(
        &router,
        register_request(
            r#"{"client_name":"Desk","redirect_uris":["http://127.0.0.1:7777/cb"]}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let client = json_body(&body);
    assert!(client["client_id"].as_str().unwrap().starts_with("lb_"));
    assert_eq!(client["client_name"], "Desk");
    assert_eq!(client["redirect_uris"], json!(["http://127.0.0.1:7777/cb"]));
    assert_eq!(client["token_endpoint_auth_method"], "none");
}

#[tokio::test]
async fn test_register_accepts_garbage() {
    let router = gateway(UNUSED_PROVIDER).router();

    let (status, _, body) = send(&router, register_request("not json at all")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_body(&body)["client_name"], "MCP Client");
}

#[tokio::test]
async fn test_registration_is_rate_limited() {
    let router = gateway(UNUSED_PROVIDER).router();

    for _ in 0..20 {
        let (status, _, _) = send(&router, register_request("{}")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _, _) = send(&router, register_request("{}")).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

fn register_from(peer: [u8; 4]) -> Request<Body> {
    let mut request = register_request("{}");
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    request
}

#[tokio::test]
async fn test_rate_limit_is_per_client_address() {
    let router = gateway(UNUSED_PROVIDER).router();

    for _ in 0..20 {
        let (status, _, _) = send(&router, register_from([203, 0, 113, 7])).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _, _) = send(&router, register_from([203, 0, 113, 7])).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _, _) = send(&router, register_from([198, 51, 100, 9])).await;
    assert_eq!(status, StatusCode::CREATED);
}
