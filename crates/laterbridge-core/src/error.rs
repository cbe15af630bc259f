//! Provider error taxonomy
//!
//! Every network failure, malformed response and rejected credential is
//! normalized into [`ProviderError`] before it leaves the client crate.

use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials were rejected and one refresh attempt did not fix it.
    /// The caller has to re-acquire credentials.
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// Any other non-success outcome: non-2xx status, transport failure,
    /// malformed body, or a provider protocol violation.
    #[error("provider request failed{}: {message}", format_status(.status))]
    RequestFailed {
        status: Option<u16>,
        message: String,
        body: Option<Value>,
    },
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl ProviderError {
    /// Failure without an HTTP status (transport, decoding, protocol)
    pub fn failed(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    /// Failure carrying the provider's status and parsed error body
    pub fn from_status(status: u16, message: impl Into<String>, body: Option<Value>) -> Self {
        Self::RequestFailed {
            status: Some(status),
            message: message.into(),
            body,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }

    /// HTTP status, if the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => *status,
            Self::AuthExpired(_) => Some(401),
        }
    }
}

/// Invalid configuration value read from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: String, value: String },

    #[error("{name}: {message}")]
    Invalid { name: String, message: String },
}
