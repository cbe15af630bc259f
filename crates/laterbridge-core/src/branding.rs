//! Centralized branding constants
//!
//! All product naming and environment variable names come from this module.

/// Human-readable product name
pub const DISPLAY_NAME: &str = "Laterbridge";

/// Name advertised in MCP `serverInfo`
pub const SERVER_NAME: &str = "laterbridge";

/// Prefix for rolling log files (`laterbridge.2026-01-22.log`)
pub const LOG_PREFIX: &str = "laterbridge";

/// Prefix for every environment variable read by the workspace
pub const ENV_PREFIX: &str = "LATERBRIDGE_";

/// Default port for the HTTP gateway
pub const DEFAULT_HTTP_PORT: u16 = 8931;

/// Prefix for fabricated OAuth client identifiers
pub const CLIENT_ID_PREFIX: &str = "lb";

/// Realm used in `WWW-Authenticate` challenges
pub const AUTH_REALM: &str = "laterbridge";

/// Build a prefixed environment variable name
///
/// # Example
/// ```
/// assert_eq!(laterbridge_core::branding::env_var("API_BASE"), "LATERBRIDGE_API_BASE");
/// ```
pub fn env_var(suffix: &str) -> String {
    format!("{}{}", ENV_PREFIX, suffix)
}

/// User agent sent to the provider
pub fn user_agent() -> String {
    format!("{}/{}", SERVER_NAME, env!("CARGO_PKG_VERSION"))
}
