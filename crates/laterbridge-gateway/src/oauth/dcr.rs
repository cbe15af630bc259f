//! Dynamic Client Registration (RFC 7591)
//!
//! There is no client registry: every request is accepted and answered with
//! a freshly fabricated client id. MCP clients that insist on registering
//! get what they need; nothing is remembered.

use chrono::Utc;
use laterbridge_core::branding;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Registration request. Every field is optional and unknown fields are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DcrRequest {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DcrResponse {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub client_id_issued_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Fabricate a registration for any request
pub fn register(request: DcrRequest) -> DcrResponse {
    let client_id = format!(
        "{}_{}",
        branding::CLIENT_ID_PREFIX,
        &Uuid::new_v4().simple().to_string()[..12]
    );
    let client_name = request
        .client_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "MCP Client".to_string());

    info!(
        "[DCR] Issued client_id {} for {:?} ({} redirect URIs)",
        client_id,
        client_name,
        request.redirect_uris.len()
    );

    DcrResponse {
        client_id,
        client_name,
        redirect_uris: request.redirect_uris,
        grant_types: if request.grant_types.is_empty() {
            vec!["authorization_code".to_string(), "refresh_token".to_string()]
        } else {
            request.grant_types
        },
        response_types: if request.response_types.is_empty() {
            vec!["code".to_string()]
        } else {
            request.response_types
        },
        token_endpoint_auth_method: "none".to_string(),
        client_id_issued_at: Utc::now().timestamp().max(0) as u64,
        scope: request.scope,
    }
}
