//! Per-client rate limiting for the OAuth endpoints.
//!
//! One fixed window per (client address, path prefix). The first rule whose
//! prefix matches a request decides, so more specific prefixes go first.
//! Requests without connection info (in-process routers) share one bucket.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Past this many buckets, stale windows are dropped before adding another
const MAX_BUCKETS: usize = 10_000;

#[derive(Clone)]
pub struct RateLimiter {
    /// (client, path prefix) → (window_start, request_count)
    buckets: Arc<DashMap<(String, String), (Instant, u32)>>,
    rules: Arc<Vec<(String, RateLimitConfig)>>,
}

impl RateLimiter {
    pub fn new(rules: Vec<(String, RateLimitConfig)>) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            rules: Arc::new(rules),
        }
    }

    /// `true` if `client`'s request to `path` is within limits
    pub fn check(&self, client: &str, path: &str) -> bool {
        let Some((prefix, config)) = self.rules.iter().find(|(prefix, _)| path.starts_with(prefix.as_str()))
        else {
            return true;
        };

        if self.buckets.len() >= MAX_BUCKETS {
            self.purge_stale();
        }

        let mut entry = self
            .buckets
            .entry((client.to_string(), prefix.clone()))
            .or_insert_with(|| (Instant::now(), 0));
        let (window_start, count) = entry.value_mut();

        if window_start.elapsed() >= config.window {
            *window_start = Instant::now();
            *count = 1;
            return true;
        }
        if *count >= config.max_requests {
            return false;
        }
        *count += 1;
        true
    }

    fn purge_stale(&self) {
        let longest = self
            .rules
            .iter()
            .map(|(_, config)| config.window)
            .max()
            .unwrap_or_default();
        self.buckets
            .retain(|_, (window_start, _)| window_start.elapsed() < longest);
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Peer IP of the connection, when the server was started with connect info
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let client = client_key(&request);
    if !limiter.check(&client, path) {
        warn!(client = %client, "[Gateway] Rate limit exceeded for {}", path);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
            .into_response();
    }
    next.run(request).await
}

fn per_minute(prefix: &str, max_requests: u32) -> (String, RateLimitConfig) {
    (
        prefix.to_string(),
        RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        },
    )
}

/// Limits for the QR bridge endpoints
pub fn default_oauth_rate_limiter() -> RateLimiter {
    RateLimiter::new(vec![
        per_minute("/authorize/complete", 60),
        per_minute("/authorize", 30),
        per_minute("/token", 60),
        per_minute("/register", 20),
    ])
}
