//! Credential extraction for the MCP endpoint
//!
//! A provider credential pair can arrive in one of three ways:
//! - `Authorization: Bearer <envelope>` issued by `/token`
//! - `Authorization: Basic base64(access:refresh)`
//! - `X-Access-Token` / `X-Refresh-Token` headers
//!
//! The middleware resolves the pair and stores it in request extensions,
//! where rmcp hands it to the handler via `http::request::Parts`.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, Method, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use laterbridge_core::{branding, CredentialPair};
use tracing::{debug, warn};

use crate::logging::{RequestSpan, TraceContext};
use crate::oauth::{discovery, EnvelopeSealer};
use crate::server::logging_middleware::extract_mcp_method;
use crate::server::AppState;

pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// JSON-RPC bodies larger than this are refused before parsing
const MAX_MCP_BODY: usize = 4 * 1024 * 1024;

/// Why a request carried no usable pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRejection {
    /// Nothing that looks like a credential
    Missing,
    /// Something was presented but could not be turned into a pair
    Invalid(String),
}

/// Resolve the provider pair from request headers
pub fn resolve_credentials(
    headers: &HeaderMap,
    sealer: &EnvelopeSealer,
) -> Result<CredentialPair, CredentialRejection> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| CredentialRejection::Invalid("authorization header is not ASCII".into()))?
            .trim();

        if let Some(token) = strip_scheme(value, "Bearer") {
            return sealer
                .open_access(token)
                .map_err(|e| CredentialRejection::Invalid(e.to_string()));
        }
        if let Some(encoded) = strip_scheme(value, "Basic") {
            return basic_pair(encoded);
        }
        return Err(CredentialRejection::Invalid(
            "unsupported authorization scheme".into(),
        ));
    }

    let access = header_value(headers, ACCESS_TOKEN_HEADER);
    let refresh = header_value(headers, REFRESH_TOKEN_HEADER);
    match (access, refresh) {
        (Some(access), Some(refresh)) => Ok(CredentialPair::new(access, refresh)),
        (None, None) => Err(CredentialRejection::Missing),
        _ => Err(CredentialRejection::Invalid(format!(
            "both {} and {} are required",
            ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER
        ))),
    }
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (head, rest) = value.split_once(' ')?;
    head.eq_ignore_ascii_case(scheme)
        .then(|| rest.trim())
        .filter(|token| !token.is_empty())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// `base64(access:refresh)`; the access token ends at the first colon
fn basic_pair(encoded: &str) -> Result<CredentialPair, CredentialRejection> {
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| CredentialRejection::Invalid("basic credentials are not base64".into()))?;
    let text = String::from_utf8(decoded)
        .map_err(|_| CredentialRejection::Invalid("basic credentials are not UTF-8".into()))?;
    let (access, refresh) = text
        .split_once(':')
        .ok_or_else(|| CredentialRejection::Invalid("basic credentials need access:refresh".into()))?;

    let pair = CredentialPair::new(access, refresh);
    if pair.is_complete() {
        Ok(pair)
    } else {
        Err(CredentialRejection::Invalid(
            "basic credentials need access:refresh".into(),
        ))
    }
}

/// Pull the pair that the middleware stored for this request
pub fn credentials_from_parts(parts: &http::request::Parts) -> Option<CredentialPair> {
    parts.extensions.get::<CredentialPair>().cloned()
}

/// Resolves credentials for `/mcp` and rejects the request with a
/// `WWW-Authenticate` challenge when none are usable
pub async fn mcp_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let ctx = request
        .extensions()
        .get::<TraceContext>()
        .cloned()
        .unwrap_or_else(|| TraceContext::new(request.method().as_str(), request.uri().path()));

    let pair = match resolve_credentials(request.headers(), &state.sealer) {
        Ok(pair) => pair,
        Err(rejection) => {
            warn!(trace_id = %ctx.trace_id, "[Gateway] Rejected MCP request: {:?}", rejection);
            return unauthorized_response(&state.config.public_base_url(), &rejection);
        }
    };
    let ctx = ctx.with_principal(pair.fingerprint());
    request.extensions_mut().insert(pair);

    let ctx = if request.method() == Method::POST {
        let (parts, body) = request.into_parts();
        let body_bytes = match to_bytes(body, MAX_MCP_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read body: {}", e);
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };
        let ctx = ctx.with_mcp_method(extract_mcp_method(&body_bytes));
        request = Request::from_parts(parts, Body::from(body_bytes));
        ctx
    } else {
        debug!(trace_id = %ctx.trace_id, "SSE stream request");
        ctx
    };
    RequestSpan::log_entry(&ctx);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() || status.is_client_error() {
        warn!(
            trace_id = %ctx.trace_id,
            status = %status,
            token = %ctx.principal_or_anon(),
            method = ctx.mcp_method.as_deref().unwrap_or("-"),
            "← MCP error"
        );
    }

    response.extensions_mut().insert(ctx);
    response
}

/// 401 pointing the client at the protected resource metadata
pub fn unauthorized_response(base_url: &str, rejection: &CredentialRejection) -> Response<Body> {
    let mut challenge = format!(
        r#"Bearer realm="{}", resource_metadata="{}""#,
        branding::AUTH_REALM,
        discovery::resource_metadata_url(base_url)
    );
    let message = match rejection {
        CredentialRejection::Missing => "Missing credentials".to_string(),
        CredentialRejection::Invalid(reason) => {
            challenge.push_str(r#", error="invalid_token""#);
            format!("Invalid credentials: {}", reason)
        }
    };

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        message,
    )
        .into_response()
}
