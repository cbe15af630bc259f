//! Credential pair - the provider's {access, refresh} tokens
//!
//! A pair is replaced as a unit on refresh; there is no way to update one
//! half in place. Token bytes are wiped from memory when a pair is dropped.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPair {
    access: String,
    refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    pub fn access(&self) -> &str {
        &self.access
    }

    pub fn refresh(&self) -> &str {
        &self.refresh
    }

    /// Both halves present and non-blank
    pub fn is_complete(&self) -> bool {
        !self.access.trim().is_empty() && !self.refresh.trim().is_empty()
    }

    /// Short access-token prefix that is safe to log
    pub fn fingerprint(&self) -> String {
        let prefix: String = self.access.chars().take(6).collect();
        format!("{}…", prefix)
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &self.fingerprint())
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}
