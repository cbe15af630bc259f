//! QR login
//!
//! The provider's login handshake has three steps: trigger a session, show
//! the user a QR code for it, then poll an exchange endpoint until the user
//! has scanned it on their phone. Polling is bounded and cancellable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use laterbridge_core::{CredentialPair, ProviderConfig, ProviderError, QrSession};
use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::executor::{read_response, transport_error};
use crate::normalize;

#[derive(Debug, Error)]
pub enum QrLoginError {
    #[error("QR login trigger failed: {0}")]
    Trigger(#[from] ProviderError),

    #[error("QR login trigger response is missing {0}")]
    IncompleteTrigger(&'static str),
}

/// Result of the trigger step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrTrigger {
    pub session_token: String,
    /// Login URL supplied by the provider, if any
    pub login_url: Option<String>,
}

/// One exchange poll
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeStatus {
    /// Not scanned yet
    Pending,
    Completed(CredentialPair),
}

/// Provider endpoints used by the QR flow
#[async_trait]
pub trait QrLoginApi: Send + Sync {
    async fn trigger(&self) -> Result<QrTrigger, QrLoginError>;
    async fn exchange(&self, session_token: &str) -> Result<ExchangeStatus, ProviderError>;
}

/// reqwest implementation of [`QrLoginApi`]
#[derive(Clone)]
pub struct HttpQrLoginApi {
    http: reqwest::Client,
    config: Arc<ProviderConfig>,
}

impl HttpQrLoginApi {
    pub fn new(http: reqwest::Client, config: Arc<ProviderConfig>) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl QrLoginApi for HttpQrLoginApi {
    async fn trigger(&self) -> Result<QrTrigger, QrLoginError> {
        let url = self.config.endpoint(&self.config.qr_trigger_path)?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "client_type": "integration" }))
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_response(response).await?;

        let (session_token, login_url) =
            normalize::qr_trigger(&body).ok_or(QrLoginError::IncompleteTrigger("session_token"))?;
        Ok(QrTrigger {
            session_token,
            login_url,
        })
    }

    async fn exchange(&self, session_token: &str) -> Result<ExchangeStatus, ProviderError> {
        let url = self.config.endpoint(&self.config.qr_exchange_path)?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "session_token": session_token }))
            .send()
            .await
            .map_err(transport_error)?;

        // The provider answers "not scanned yet" with a 4xx or an empty body
        let status = response.status();
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            return Ok(ExchangeStatus::Pending);
        }
        let body = read_response(response).await?;
        Ok(normalize::credentials(&body)
            .map(ExchangeStatus::Completed)
            .unwrap_or(ExchangeStatus::Pending))
    }
}

/// What the user is shown while the session is pending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrChallenge {
    pub session: QrSession,
    /// URL the phone opens after scanning
    pub login_url: String,
    /// Renderable QR image encoding `login_url`
    pub image_url: String,
}

/// Terminal state of one polling run
#[derive(Debug, Clone, PartialEq)]
pub enum QrOutcome {
    Resolved(CredentialPair),
    /// Polling window closed; the user may start over
    Expired { attempts: u32 },
    /// Caller went away before the session resolved
    Cancelled { attempts: u32 },
}

/// Trigger and poll loop around a [`QrLoginApi`]
#[derive(Clone)]
pub struct QrLoginBridge {
    api: Arc<dyn QrLoginApi>,
    config: Arc<ProviderConfig>,
}

impl QrLoginBridge {
    pub fn new(api: Arc<dyn QrLoginApi>, config: Arc<ProviderConfig>) -> Self {
        Self { api, config }
    }

    /// Bridge backed by the provider's HTTP endpoints
    pub fn http(http: reqwest::Client, config: Arc<ProviderConfig>) -> Self {
        Self::new(Arc::new(HttpQrLoginApi::new(http, config.clone())), config)
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.poll_attempts
    }

    /// Start a session and build the QR payload for it
    pub async fn start(&self) -> Result<QrChallenge, QrLoginError> {
        let trigger = self.api.trigger().await?;
        let login_url = trigger
            .login_url
            .unwrap_or_else(|| self.config.login_url(&trigger.session_token));
        if login_url.trim().is_empty() {
            return Err(QrLoginError::IncompleteTrigger("login URL"));
        }
        let image_url = qr_image_url(&self.config.qr_image_service, &login_url);

        info!("[QR] Login session started");
        Ok(QrChallenge {
            session: QrSession::new(trigger.session_token),
            login_url,
            image_url,
        })
    }

    /// Poll until the session resolves, the attempt bound is reached, or
    /// `cancel` fires. Each attempt waits one interval and then polls, so an
    /// expired run takes `max_attempts` intervals.
    ///
    /// Exchange failures count as "not yet" and do not end the run.
    pub async fn wait(&self, session: &QrSession, cancel: &CancellationToken) -> QrOutcome {
        let max_attempts = self.max_attempts();
        let interval = self.poll_interval();

        for attempt in 1..=max_attempts {
            let polled = tokio::select! {
                _ = cancel.cancelled() => None,
                status = async {
                    tokio::time::sleep(interval).await;
                    self.api.exchange(&session.session_token).await
                } => Some(status),
            };

            match polled {
                None => {
                    info!("[QR] Polling cancelled after {} attempts", attempt - 1);
                    return QrOutcome::Cancelled {
                        attempts: attempt - 1,
                    };
                }
                Some(Ok(ExchangeStatus::Completed(pair))) => {
                    info!("[QR] Session resolved on attempt {}", attempt);
                    return QrOutcome::Resolved(pair);
                }
                Some(Ok(ExchangeStatus::Pending)) => {
                    debug!("[QR] Attempt {}/{}: pending", attempt, max_attempts);
                }
                Some(Err(e)) => {
                    debug!("[QR] Attempt {}/{}: exchange error: {}", attempt, max_attempts, e);
                }
            }
        }

        warn!(
            "[QR] Session expired after {} attempts ({}s)",
            max_attempts,
            self.config.poll_window().as_secs()
        );
        QrOutcome::Expired {
            attempts: max_attempts,
        }
    }
}

fn qr_image_url(service: &Url, login_url: &str) -> String {
    let mut url = service.clone();
    url.query_pairs_mut()
        .append_pair("size", "300x300")
        .append_pair("data", login_url);
    url.into()
}
