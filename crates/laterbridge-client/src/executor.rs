//! Authenticated request executor
//!
//! Performs one provider call with the current access token. A 401 triggers
//! exactly one refresh; on success the new pair is installed, published to
//! the observer, and the original call is retried once. The executor never
//! loops: at most two attempts and one refresh per call.

use std::sync::Arc;

use laterbridge_core::{CredentialPair, ProviderConfig, ProviderError};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::observer::TokenObserver;
use crate::refresher::TokenRefresher;

/// Build the shared reqwest client from provider settings
pub fn build_http_client(config: &ProviderConfig) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| ProviderError::failed(format!("failed to build HTTP client: {}", e)))
}

/// Owns exactly one live [`CredentialPair`] for one logical session
pub struct AuthedExecutor {
    http: reqwest::Client,
    config: Arc<ProviderConfig>,
    refresher: TokenRefresher,
    credentials: CredentialPair,
    observer: Option<Arc<dyn TokenObserver>>,
}

impl AuthedExecutor {
    pub fn new(
        http: reqwest::Client,
        config: Arc<ProviderConfig>,
        credentials: CredentialPair,
    ) -> Self {
        let refresher = TokenRefresher::new(http.clone(), config.clone());
        Self {
            http,
            config,
            refresher,
            credentials,
            observer: None,
        }
    }

    /// Register the observer notified after every successful refresh
    pub fn with_observer(mut self, observer: Arc<dyn TokenObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialPair {
        &self.credentials
    }

    /// Resolve a relative endpoint path or an absolute URL (feed cursors are
    /// sometimes full URLs). Absolute URLs must point at the provider origin
    /// so the bearer token is never sent anywhere else.
    pub fn resolve(&self, target: &str) -> Result<Url, ProviderError> {
        match Url::parse(target) {
            Ok(url) => {
                if url.origin() != self.config.api_base.origin() {
                    return Err(ProviderError::failed(format!(
                        "refusing to call {} outside the provider origin",
                        url.origin().ascii_serialization()
                    )));
                }
                Ok(url)
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => self.config.endpoint(target),
            Err(e) => Err(ProviderError::failed(format!(
                "invalid request target {:?}: {}",
                target, e
            ))),
        }
    }

    /// Execute one authenticated call and return the parsed JSON body.
    ///
    /// An empty 2xx body parses as `Value::Null`.
    pub async fn execute(
        &mut self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let response = self.send(method.clone(), url, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_response(response).await;
        }

        info!(
            "[Executor] {} {} returned 401, refreshing credentials",
            method,
            url.path()
        );
        let fresh = match self.refresher.refresh(&self.credentials).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("[Executor] Token refresh failed: {}", e);
                return Err(ProviderError::AuthExpired(format!(
                    "token refresh failed: {}",
                    e
                )));
            }
        };
        self.install(fresh).await;

        let retry = self.send(method.clone(), url, body).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(
                "[Executor] {} {} still unauthorized after refresh",
                method,
                url.path()
            );
            return Err(ProviderError::AuthExpired(
                "credentials rejected after refresh".to_string(),
            ));
        }
        read_response(retry).await
    }

    /// Convenience for relative paths and cursor URLs
    pub async fn execute_target(
        &mut self,
        method: Method,
        target: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let url = self.resolve(target)?;
        self.execute(method, &url, body).await
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ProviderError> {
        debug!("[Executor] {} {}", method, url.path());
        let mut request = self
            .http
            .request(method, url.clone())
            .bearer_auth(self.credentials.access());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(transport_error)
    }

    /// Replace the live pair as a unit and publish it
    async fn install(&mut self, fresh: CredentialPair) {
        info!(
            "[Executor] Installed refreshed credentials ({})",
            fresh.fingerprint()
        );
        self.credentials = fresh;
        if let Some(observer) = &self.observer {
            if let Err(e) = observer.credentials_rotated(&self.credentials).await {
                warn!("[Executor] Token observer failed: {}", e);
            }
        }
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("transport error: {}", err)
    };
    ProviderError::RequestFailed {
        status: err.status().map(|s| s.as_u16()),
        message,
        body: None,
    }
}

/// Map a provider response onto JSON or a `RequestFailed`
pub(crate) async fn read_response(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport_error)?;

    if !status.is_success() {
        let body = serde_json::from_slice::<Value>(&bytes).ok();
        let reason = status.canonical_reason().unwrap_or("unexpected status");
        return Err(ProviderError::from_status(
            status.as_u16(),
            reason.to_lowercase(),
            body,
        ));
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| {
        ProviderError::from_status(
            status.as_u16(),
            format!("malformed provider response: {}", e),
            None,
        )
    })
}
