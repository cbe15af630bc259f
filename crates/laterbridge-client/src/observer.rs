//! Token rotation observers
//!
//! The executor publishes every refreshed pair to one observer so callers can
//! re-persist rotated tokens. Observer failures are logged by the executor and
//! never fail the request that triggered the refresh.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use laterbridge_core::CredentialPair;
use serde_json::json;
use tracing::info;

#[async_trait]
pub trait TokenObserver: Send + Sync {
    async fn credentials_rotated(&self, pair: &CredentialPair) -> anyhow::Result<()>;
}

/// Logs rotations. Used where rotated tokens cannot be handed back to the
/// caller (stateless HTTP requests).
#[derive(Debug, Default, Clone)]
pub struct LoggingObserver;

#[async_trait]
impl TokenObserver for LoggingObserver {
    async fn credentials_rotated(&self, pair: &CredentialPair) -> anyhow::Result<()> {
        info!(
            "[Observer] Provider rotated credentials ({}); the client's copy is now stale",
            pair.fingerprint()
        );
        Ok(())
    }
}

/// Writes `{access_token, refresh_token}` JSON to a file on every rotation
#[derive(Debug, Clone)]
pub struct TokenFileObserver {
    path: PathBuf,
}

impl TokenFileObserver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a pair previously written by this observer
    pub async fn load(path: &Path) -> anyhow::Result<CredentialPair> {
        let bytes = tokio::fs::read(path).await?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        crate::normalize::credentials(&value)
            .ok_or_else(|| anyhow::anyhow!("{} does not contain a token pair", path.display()))
    }
}

#[async_trait]
impl TokenObserver for TokenFileObserver {
    async fn credentials_rotated(&self, pair: &CredentialPair) -> anyhow::Result<()> {
        let body = serde_json::to_vec_pretty(&json!({
            "access_token": pair.access(),
            "refresh_token": pair.refresh(),
        }))?;

        // Write-then-rename so a crash never leaves a truncated token file
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!("[Observer] Persisted rotated credentials to {}", self.path.display());
        Ok(())
    }
}
