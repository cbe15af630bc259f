//! Provider configuration
//!
//! Endpoint locations, HTTP client settings and QR login polling bounds.
//! Every value has a default and can be overridden through `LATERBRIDGE_*`
//! environment variables.

use std::time::Duration;

use url::Url;

use crate::branding;
use crate::error::{ConfigError, ProviderError};

/// Default provider API root. Endpoint paths are joined onto it, so it must
/// end with a slash.
pub const DEFAULT_API_BASE: &str = "https://api.getmatter.app/api/v11/";

/// Placeholder replaced by the session token in [`ProviderConfig::login_url_template`]
pub const SESSION_TOKEN_PLACEHOLDER: &str = "{session_token}";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API root every relative endpoint is resolved against
    pub api_base: Url,
    /// Reading-list feed (first page)
    pub feed_path: String,
    /// Enqueue a URL
    pub save_path: String,
    /// Token refresh
    pub refresh_path: String,
    /// Start a QR login session
    pub qr_trigger_path: String,
    /// Poll a QR login session for credentials
    pub qr_exchange_path: String,
    /// Login URL encoded into the QR image when the provider does not supply one
    pub login_url_template: String,
    /// Image service rendering the QR code; receives the login URL as `data`
    pub qr_image_service: Url,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Delay before each exchange poll
    pub poll_interval: Duration,
    /// Exchange polls before a QR session expires
    pub poll_attempts: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            feed_path: "library_items/queue_feed/".to_string(),
            save_path: "library_items/save/".to_string(),
            refresh_path: "token/refresh/".to_string(),
            qr_trigger_path: "qr_login/trigger/".to_string(),
            qr_exchange_path: "qr_login/exchange/".to_string(),
            login_url_template: format!(
                "https://web.getmatter.app/qr-login?session_token={}",
                SESSION_TOKEN_PLACEHOLDER
            ),
            qr_image_service: Url::parse("https://api.qrserver.com/v1/create-qr-code/")
                .expect("default QR image service is a valid URL"),
            user_agent: branding::user_agent(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            poll_attempts: 120,
        }
    }
}

impl ProviderConfig {
    /// Build from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (process env, test fixtures)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |suffix: &str| {
            let name = branding::env_var(suffix);
            lookup(&name)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (name, v))
        };

        if let Some((name, value)) = var("API_BASE") {
            config.api_base = parse_base_url(&name, &value)?;
        }
        if let Some((name, value)) = var("QR_IMAGE_SERVICE") {
            config.qr_image_service =
                Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { name, source })?;
        }
        if let Some((name, value)) = var("LOGIN_URL_TEMPLATE") {
            if !value.contains(SESSION_TOKEN_PLACEHOLDER) {
                return Err(ConfigError::Invalid {
                    name,
                    message: format!("template must contain {}", SESSION_TOKEN_PLACEHOLDER),
                });
            }
            config.login_url_template = value;
        }
        if let Some((_, value)) = var("USER_AGENT") {
            config.user_agent = value;
        }
        if let Some((name, value)) = var("TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_positive(&name, &value)?);
        }
        if let Some((name, value)) = var("POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(parse_positive(&name, &value)?);
        }
        if let Some((name, value)) = var("POLL_ATTEMPTS") {
            let attempts = parse_positive(&name, &value)?;
            config.poll_attempts = u32::try_from(attempts)
                .map_err(|_| ConfigError::InvalidNumber { name, value })?;
        }

        Ok(config)
    }

    /// Resolve an endpoint path against the API root
    pub fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.api_base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ProviderError::failed(format!("invalid endpoint {:?}: {}", path, e)))
    }

    /// Login URL for a QR session token
    pub fn login_url(&self, session_token: &str) -> String {
        self.login_url_template
            .replace(SESSION_TOKEN_PLACEHOLDER, &urlencode_component(session_token))
    }

    /// Upper bound on how long a QR session is polled
    pub fn poll_window(&self) -> Duration {
        self.poll_interval * self.poll_attempts
    }
}

fn parse_base_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    // Url::join drops the last segment of a base without a trailing slash
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
        name: name.to_string(),
        source,
    })
}

fn parse_positive(name: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn urlencode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
