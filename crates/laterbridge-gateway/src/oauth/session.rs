//! Pending QR login sessions
//!
//! The only shared mutable state in the gateway: a map from an unguessable
//! session id to the QR session shown on the authorization page. Entries are
//! claimed exactly once by the completion request and purged once stale. The
//! store is a trait so several gateway processes can share one backend.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use laterbridge_core::QrSession;
use rand::RngCore;

/// An authorization request waiting for its QR code to be scanned
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub qr: QrSession,
    pub redirect_uri: String,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl PendingLogin {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[async_trait]
pub trait LoginSessionStore: Send + Sync {
    async fn insert(&self, session_id: String, pending: PendingLogin);

    /// Remove and return; expired entries read as absent
    async fn take(&self, session_id: &str) -> Option<PendingLogin>;

    /// Drop every expired entry, returning how many were removed
    async fn purge_expired(&self) -> usize;

    async fn len(&self) -> usize;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryLoginStore {
    entries: DashMap<String, PendingLogin>,
}

impl MemoryLoginStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginSessionStore for MemoryLoginStore {
    async fn insert(&self, session_id: String, pending: PendingLogin) {
        self.entries.insert(session_id, pending);
    }

    async fn take(&self, session_id: &str) -> Option<PendingLogin> {
        let (_, pending) = self.entries.remove(session_id)?;
        (!pending.is_expired()).then_some(pending)
    }

    async fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, pending| !pending.is_expired());
        before.saturating_sub(self.entries.len())
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 256-bit random session id, base64url
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
