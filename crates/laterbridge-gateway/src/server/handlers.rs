//! HTTP handlers for health, discovery, registration and token exchange

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use laterbridge_core::CredentialPair;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::AppState;
use crate::oauth::{self, pkce, AuthorizationServerMetadata, DcrRequest, ProtectedResourceMetadata};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// RFC 8414 metadata
pub async fn oauth_metadata(State(state): State<Arc<AppState>>) -> Json<AuthorizationServerMetadata> {
    debug!("[OAuth] Serving authorization server metadata");
    Json(AuthorizationServerMetadata::for_base(&state.base_url()))
}

/// RFC 9728 metadata
pub async fn resource_metadata(State(state): State<Arc<AppState>>) -> Json<ProtectedResourceMetadata> {
    debug!("[OAuth] Serving protected resource metadata");
    Json(ProtectedResourceMetadata::for_base(&state.base_url()))
}

/// Accepts any body, including none at all
pub async fn register(body: Bytes) -> Response {
    let request: DcrRequest = if body.is_empty() {
        DcrRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            debug!("[DCR] Ignoring unparseable registration body: {}", e);
            DcrRequest::default()
        })
    };
    (StatusCode::CREATED, Json(oauth::register(request))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// Absent means `authorization_code` when a `code` is present
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponseBody {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

type TokenError = (StatusCode, Json<TokenErrorResponse>);

/// JSON or `application/x-www-form-urlencoded`, chosen by content type
pub fn parse_token_request(content_type: Option<&str>, body: &[u8]) -> Result<TokenRequest, String> {
    let is_json = content_type
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false);

    let value = if is_json {
        serde_json::from_slice::<Value>(body).map_err(|e| format!("Malformed JSON body: {}", e))?
    } else {
        let fields: Map<String, Value> = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        Value::Object(fields)
    };

    serde_json::from_value(value).map_err(|e| format!("Invalid token request: {}", e))
}

/// Token endpoint: authorization code and refresh grants, both stateless
pub async fn token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TokenResponseBody>, TokenError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request = parse_token_request(content_type, &body).map_err(|message| {
        warn!("[OAuth] {}", message);
        token_error("invalid_request", &message)
    })?;

    let grant_type = match (request.grant_type.as_deref(), &request.code) {
        (Some(grant_type), _) => grant_type,
        (None, Some(_)) => "authorization_code",
        (None, None) => {
            warn!("[OAuth] Token request without grant_type or code");
            return Err(token_error("invalid_request", "Missing grant_type"));
        }
    };
    info!(
        "[OAuth] Token request: grant_type={}, client_id={:?}",
        grant_type, request.client_id
    );

    match grant_type {
        "authorization_code" => exchange_code(&state, &request),
        "refresh_token" => refresh(&state, &request).await,
        other => {
            warn!("[OAuth] Unsupported grant_type: {}", other);
            Err(token_error(
                "unsupported_grant_type",
                "Only authorization_code and refresh_token are supported",
            ))
        }
    }
}

fn exchange_code(state: &AppState, request: &TokenRequest) -> Result<Json<TokenResponseBody>, TokenError> {
    let Some(code) = request.code.as_deref() else {
        warn!("[OAuth] Missing authorization code");
        return Err(token_error("invalid_request", "Missing authorization code"));
    };

    let grant = state.sealer.open_code(code).map_err(|e| {
        warn!("[OAuth] Rejected authorization code: {}", e);
        token_error("invalid_grant", &format!("Authorization code rejected: {}", e))
    })?;

    if let (Some(expected), Some(presented)) = (&grant.redirect_uri, &request.redirect_uri) {
        if expected != presented {
            warn!("[OAuth] redirect_uri mismatch");
            return Err(token_error("invalid_grant", "Redirect URI mismatch"));
        }
    }

    if let Some(challenge) = &grant.code_challenge {
        let Some(verifier) = request.code_verifier.as_deref() else {
            warn!("[OAuth] Missing code_verifier for PKCE-bound code");
            return Err(token_error("invalid_request", "Missing code_verifier"));
        };
        if !pkce::verify(verifier, challenge, grant.code_challenge_method.as_deref()) {
            warn!("[OAuth] PKCE verification failed");
            return Err(token_error("invalid_grant", "PKCE verification failed"));
        }
    }

    let response = issue_tokens(state, &grant.credentials)?;
    info!(
        "[OAuth] Issued tokens for {}",
        grant.credentials.fingerprint()
    );
    Ok(response)
}

async fn refresh(state: &AppState, request: &TokenRequest) -> Result<Json<TokenResponseBody>, TokenError> {
    let Some(refresh_token) = request.refresh_token.as_deref() else {
        warn!("[OAuth] Missing refresh_token");
        return Err(token_error("invalid_request", "Missing refresh_token"));
    };

    let current = state.sealer.open_refresh(refresh_token).map_err(|e| {
        warn!("[OAuth] Rejected refresh token: {}", e);
        token_error("invalid_grant", &format!("Refresh token rejected: {}", e))
    })?;

    let rotated = state.refresher.refresh(&current).await.map_err(|e| {
        warn!("[OAuth] Provider refresh failed: {}", e);
        match e.status() {
            Some(status) if (400..500).contains(&status) => {
                token_error("invalid_grant", "The provider rejected the refresh token")
            }
            _ => (
                StatusCode::BAD_GATEWAY,
                Json(TokenErrorResponse {
                    error: "temporarily_unavailable".to_string(),
                    error_description: Some(format!("Provider refresh failed: {}", e)),
                }),
            ),
        }
    })?;

    let response = issue_tokens(state, &rotated)?;
    info!(
        "[OAuth] Refreshed tokens {} -> {}",
        current.fingerprint(),
        rotated.fingerprint()
    );
    Ok(response)
}

fn issue_tokens(
    state: &AppState,
    pair: &CredentialPair,
) -> Result<Json<TokenResponseBody>, TokenError> {
    let sealed = state.sealer.seal_access(pair).and_then(|access| {
        state
            .sealer
            .seal_refresh(pair)
            .map(|refresh| (access, refresh))
    });
    let (access_token, refresh_token) = sealed.map_err(|e| {
        warn!("[OAuth] Failed to seal tokens: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TokenErrorResponse {
                error: "server_error".to_string(),
                error_description: Some("Failed to issue tokens".to_string()),
            }),
        )
    })?;

    Ok(Json(TokenResponseBody {
        access_token,
        token_type: "Bearer".to_string(),
        refresh_token,
    }))
}

fn token_error(error: &str, description: &str) -> TokenError {
    (
        StatusCode::BAD_REQUEST,
        Json(TokenErrorResponse {
            error: error.to_string(),
            error_description: Some(description.to_string()),
        }),
    )
}
