//! Discovery documents
//!
//! Static metadata pointing MCP clients at the bridge's endpoints.

use serde::Serialize;

pub const SCOPES: &[&str] = &["articles"];

/// OAuth Authorization Server Metadata (RFC 8414)
#[derive(Debug, Serialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    pub fn for_base(base: &str) -> Self {
        Self {
            issuer: base.to_string(),
            authorization_endpoint: format!("{}/authorize", base),
            token_endpoint: format!("{}/token", base),
            registration_endpoint: format!("{}/register", base),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            code_challenge_methods_supported: vec!["S256".to_string(), "plain".to_string()],
            token_endpoint_auth_methods_supported: vec!["none".to_string()],
            scopes_supported: SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// OAuth Protected Resource Metadata (RFC 9728)
#[derive(Debug, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn for_base(base: &str) -> Self {
        Self {
            resource: format!("{}/mcp", base),
            authorization_servers: vec![base.to_string()],
            bearer_methods_supported: vec!["header".to_string()],
            scopes_supported: SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Where the `WWW-Authenticate` challenge points clients
pub fn resource_metadata_url(base: &str) -> String {
    format!("{}/.well-known/oauth-protected-resource/mcp", base)
}
