//! QR login session issued by the provider

use chrono::{DateTime, Utc};

/// Created on trigger, polled until it yields credentials or the polling
/// window closes. Lives in process memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrSession {
    pub session_token: String,
    pub created_at: DateTime<Utc>,
}

impl QrSession {
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            created_at: Utc::now(),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
