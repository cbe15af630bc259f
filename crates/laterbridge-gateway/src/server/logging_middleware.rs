//! HTTP request/response logging middleware
//!
//! One entry and one exit line per request, tagged with a trace id. `/mcp`
//! responses may be long-lived event streams, so their bodies are never
//! buffered here.

use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use http_body_util::BodyExt;
use tracing::{debug, warn, Instrument};

use crate::logging::{RequestSpan, TraceContext};

const MAX_BODY_LOG_SIZE: usize = 64 * 1024;

/// Bodies on these paths carry tokens or authorization codes
const SENSITIVE_PATHS: &[&str] = &["/token", "/register", "/authorize/complete"];

/// HTML pages, not worth logging
const SKIP_BODY_PATHS: &[&str] = &["/authorize"];

const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-access-token",
    "x-refresh-token",
];

pub fn is_sensitive_path(path: &str) -> bool {
    SENSITIVE_PATHS.iter().any(|p| path.starts_with(p))
}

fn should_skip_body(path: &str) -> bool {
    SKIP_BODY_PATHS.iter().any(|p| path == *p)
}

/// Headers worth seeing at DEBUG, credentials masked
fn redact_headers_compact(headers: &axum::http::HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| {
            let n = name.as_str();
            SENSITIVE_HEADERS.contains(&n)
                || matches!(
                    n,
                    "content-type" | "accept" | "user-agent" | "mcp-session-id" | "mcp-protocol-version"
                )
        })
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.as_str()) {
                format!("{}=[REDACTED]", name)
            } else {
                format!("{}={:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_body(bytes: &[u8], redact: bool) -> String {
    if redact {
        return "[REDACTED]".to_string();
    }
    if bytes.is_empty() {
        return "[empty]".to_string();
    }
    if bytes.len() > MAX_BODY_LOG_SIZE {
        return format!("[{} bytes]", bytes.len());
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
                return serde_json::to_string(&json).unwrap_or_else(|_| text.to_string());
            }
            if text.chars().count() > 200 {
                format!("{}...", text.chars().take(200).collect::<String>())
            } else {
                text.to_string()
            }
        }
        Err(_) => format!("[binary: {} bytes]", bytes.len()),
    }
}

/// JSON-RPC method of an MCP request body
pub fn extract_mcp_method(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    json.get("method")
        .and_then(|m| m.as_str())
        .map(String::from)
}

pub async fn http_logging_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let is_sensitive = is_sensitive_path(&path);

    let ctx = TraceContext::new(&method, &path);
    let span = RequestSpan::enter(&ctx);

    if path.starts_with("/mcp") {
        let mut request = request;
        request.extensions_mut().insert(ctx.clone());

        return async move {
            debug!(
                trace_id = %ctx.trace_id,
                headers = %redact_headers_compact(request.headers()),
                "MCP request"
            );
            let response = next.run(request).await;
            // The credential layer hands back the context enriched with the
            // JSON-RPC method and token fingerprint
            let ctx = response
                .extensions()
                .get::<TraceContext>()
                .cloned()
                .unwrap_or(ctx);
            RequestSpan::log_exit(&ctx, response.status().as_u16());
            Ok(response)
        }
        .instrument(span)
        .await;
    }

    async move {
        RequestSpan::log_entry(&ctx);

        let (parts, body) = request.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                return Err(StatusCode::BAD_REQUEST);
            }
        };
        if !should_skip_body(&path) && !body_bytes.is_empty() {
            debug!(
                trace_id = %ctx.trace_id,
                body = %format_body(&body_bytes, is_sensitive),
                "Request body"
            );
        }
        let mut request = Request::from_parts(parts, Body::from(body_bytes));
        request.extensions_mut().insert(ctx.clone());

        let response = next.run(request).await;

        let (parts, body) = response.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read response body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };
        if !should_skip_body(&path) && !body_bytes.is_empty() {
            debug!(
                trace_id = %ctx.trace_id,
                body = %format_body(&body_bytes, is_sensitive),
                "Response body"
            );
        }

        RequestSpan::log_exit(&ctx, parts.status.as_u16());
        Ok(Response::from_parts(parts, Body::from(body_bytes)))
    }
    .instrument(span)
    .await
}
