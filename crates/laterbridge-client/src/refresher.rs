//! Token refresher
//!
//! One network call carrying the current refresh token. No internal retry
//! and no shared state: the new pair is returned for the caller to install.

use std::sync::Arc;

use laterbridge_core::{CredentialPair, ProviderConfig, ProviderError};
use serde_json::json;
use tracing::debug;

use crate::executor::{read_response, transport_error};
use crate::normalize;

#[derive(Clone)]
pub struct TokenRefresher {
    http: reqwest::Client,
    config: Arc<ProviderConfig>,
}

impl TokenRefresher {
    pub fn new(http: reqwest::Client, config: Arc<ProviderConfig>) -> Self {
        Self { http, config }
    }

    /// Exchange `current.refresh()` for a fresh pair
    pub async fn refresh(&self, current: &CredentialPair) -> Result<CredentialPair, ProviderError> {
        let url = self.config.endpoint(&self.config.refresh_path)?;
        debug!("[Refresher] POST {}", url.path());

        let response = self
            .http
            .post(url)
            .json(&json!({ "refresh_token": current.refresh() }))
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_response(response).await?;

        normalize::credentials(&body).ok_or_else(|| {
            ProviderError::failed("refresh response did not contain a complete token pair")
        })
    }
}
