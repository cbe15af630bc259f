//! Gateway integration tests
//!
//! Drive the full axum router in-process: discovery and registration, the
//! token endpoint, the QR authorization page, rate limits, and MCP tool calls
//! over Streamable HTTP against a wiremock provider.

mod discovery;
mod mcp;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use laterbridge_client::{QrLoginApi, QrLoginBridge};
use laterbridge_gateway::{GatewayConfig, GatewayServer};
use tests::provider;
use tower::ServiceExt;

pub const KEY_HEX: &str = "8f1e0c2d4b6a79583d2e1f0a9b8c7d6e5f4a3b2c1d0e9f8a7b6c5d4e3f2a1b0c";

/// Provider address for tests that never reach the provider
pub const UNUSED_PROVIDER: &str = "http://127.0.0.1:9";

pub fn sealed_config() -> GatewayConfig {
    GatewayConfig {
        sealing_key: Some(KEY_HEX.to_string()),
        ..Default::default()
    }
}

/// Gateway using the provider's HTTP QR endpoints at `provider_uri`
pub fn gateway(provider_uri: &str) -> GatewayServer {
    GatewayServer::new(sealed_config(), provider::config(provider_uri)).unwrap()
}

/// Gateway whose QR login is answered by `api`
pub fn gateway_with_qr(provider_uri: &str, api: Arc<dyn QrLoginApi>) -> GatewayServer {
    let config = provider::shared(provider_uri);
    let bridge = QrLoginBridge::new(api, config.clone());
    GatewayServer::with_bridge(sealed_config(), config, provider::http(), bridge).unwrap()
}

/// One request through the router; the body is read to the end
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = tokio::time::timeout(Duration::from_secs(10), body.collect())
        .await
        .expect("response body timed out")
        .unwrap()
        .to_bytes();
    (parts.status, parts.headers, bytes)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_body(bytes: &Bytes) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        panic!("not JSON ({}): {}", e, String::from_utf8_lossy(bytes))
    })
}
