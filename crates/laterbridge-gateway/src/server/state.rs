//! Shared state for the HTTP routes

use std::sync::Arc;

use chrono::{DateTime, Utc};
use laterbridge_client::{QrLoginBridge, TokenRefresher};
use laterbridge_core::ProviderConfig;
use tokio_util::sync::CancellationToken;

use super::GatewayConfig;
use crate::oauth::{EnvelopeSealer, LoginSessionStore};

/// Extra time a pending login stays visible after its poll window closes
const LOGIN_GRACE_SECS: i64 = 60;

pub struct AppState {
    pub config: GatewayConfig,
    pub provider: Arc<ProviderConfig>,
    pub http: reqwest::Client,
    pub sealer: EnvelopeSealer,
    pub bridge: QrLoginBridge,
    pub refresher: TokenRefresher,
    pub sessions: Arc<dyn LoginSessionStore>,
    /// Cancelled on shutdown; aborts in-flight QR polling
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn base_url(&self) -> String {
        self.config.public_base_url()
    }

    /// When a login started now stops being completable
    pub fn login_deadline(&self) -> DateTime<Utc> {
        let window = chrono::Duration::from_std(self.provider.poll_window())
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        Utc::now() + window + chrono::Duration::seconds(LOGIN_GRACE_SECS)
    }
}
