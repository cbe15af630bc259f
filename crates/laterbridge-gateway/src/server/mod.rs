//! Gateway Server
//!
//! Serves the MCP tools over Streamable HTTP next to the QR OAuth bridge,
//! or over stdio for a single local client.

mod authorize;
mod handlers;
pub mod logging_middleware;
pub mod rate_limit;
mod state;

pub use authorize::{code_redirect, CompleteResponse};
pub use handlers::{parse_token_request, HealthResponse, TokenErrorResponse, TokenResponseBody};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use laterbridge_client::{build_http_client, LoggingObserver, QrLoginBridge, TokenRefresher};
use laterbridge_core::{branding, ProviderConfig};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::mcp::{mcp_auth_middleware, ReadLaterHandler};
use crate::oauth::{EnvelopeSealer, LoginSessionStore, MemoryLoginStore};

/// How often stale pending logins are dropped
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Externally visible origin, when it differs from `http://localhost:<port>`
    pub public_url: Option<String>,
    pub enable_cors: bool,
    /// Session-bound event streams instead of one response per request
    pub stateful: bool,
    /// 64 hex characters; envelopes are only encoded when absent
    pub sealing_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: branding::DEFAULT_HTTP_PORT,
            public_url: None,
            enable_cors: true,
            stateful: false,
            sealing_key: None,
        }
    }
}

impl GatewayConfig {
    /// Fill `public_url` and `sealing_key` from the environment
    pub fn with_env(mut self) -> Self {
        let read = |suffix: &str| {
            std::env::var(branding::env_var(suffix))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(url) = read("PUBLIC_URL") {
            self.public_url = Some(url);
        }
        if let Some(key) = read("SEALING_KEY") {
            self.sealing_key = Some(key);
        }
        self
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    /// Origin advertised in discovery documents and challenges
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Gateway talking to the provider over HTTP
    pub fn new(config: GatewayConfig, provider: ProviderConfig) -> anyhow::Result<Self> {
        let provider = Arc::new(provider);
        let http = build_http_client(&provider).context("failed to build provider HTTP client")?;
        let bridge = QrLoginBridge::http(http.clone(), provider.clone());
        Self::with_bridge(config, provider, http, bridge)
    }

    /// Gateway with an explicit QR bridge
    pub fn with_bridge(
        config: GatewayConfig,
        provider: Arc<ProviderConfig>,
        http: reqwest::Client,
        bridge: QrLoginBridge,
    ) -> anyhow::Result<Self> {
        let sealer = match &config.sealing_key {
            Some(key) => EnvelopeSealer::from_hex(key).context("invalid envelope sealing key")?,
            None => EnvelopeSealer::plain(),
        };
        let sessions: Arc<dyn LoginSessionStore> = Arc::new(MemoryLoginStore::new());

        let state = Arc::new(AppState {
            config: config.clone(),
            refresher: TokenRefresher::new(http.clone(), provider.clone()),
            provider,
            http,
            sealer,
            bridge,
            sessions,
            shutdown: CancellationToken::new(),
        });

        Ok(Self { config, state })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Cancelling this stops the server and any QR polling in flight
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let handler = ReadLaterHandler::per_request(state.provider.clone(), state.http.clone())
            .with_observer(Arc::new(LoggingObserver));

        let mcp_service = StreamableHttpService::new(
            move || {
                debug!("[Gateway] Creating handler instance for MCP session");
                Ok(handler.clone())
            },
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig {
                stateful_mode: self.config.stateful,
                sse_keep_alive: Some(Duration::from_secs(30)),
                sse_retry: Some(Duration::from_secs(3)),
                cancellation_token: state.shutdown.child_token(),
            },
        );

        let mcp_routes = Router::new()
            .nest_service("/mcp", mcp_service)
            .layer(middleware::from_fn_with_state(state.clone(), mcp_auth_middleware));

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/.well-known/oauth-authorization-server",
                get(handlers::oauth_metadata),
            )
            .route(
                "/.well-known/oauth-authorization-server/mcp",
                get(handlers::oauth_metadata),
            )
            .route(
                "/.well-known/oauth-protected-resource",
                get(handlers::resource_metadata),
            )
            .route(
                "/.well-known/oauth-protected-resource/mcp",
                get(handlers::resource_metadata),
            )
            .route("/authorize", get(authorize::authorize))
            .route("/authorize/complete", get(authorize::complete))
            .route("/token", post(handlers::token))
            .route("/register", post(handlers::register))
            .with_state(state)
            .merge(mcp_routes)
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                rate_limit::default_oauth_rate_limiter(),
                rate_limit::rate_limit_middleware,
            ));

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.addr()?;

        info!("[Gateway] Starting on {}", addr);
        info!("[Gateway] Public URL: {}", self.config.public_base_url());
        info!(
            "[Gateway] MCP transport: {}",
            if self.config.stateful {
                "stateful (session event streams)"
            } else {
                "stateless"
            }
        );
        if self.state.sealer.is_sealed() {
            info!("[Gateway] Envelope sealing: enabled");
        } else {
            warn!("[Gateway] Envelope sealing: disabled (tokens are encoded, not encrypted)");
        }

        let sessions = self.state.sessions.clone();
        let shutdown = self.state.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PURGE_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = sessions.purge_expired().await;
                        if purged > 0 {
                            debug!("[Gateway] Purged {} expired login sessions", purged);
                        }
                    }
                }
            }
        });

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!("[Gateway] Ready to accept connections");

        let shutdown = self.state.shutdown.clone();
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

        info!("[Gateway] Stopped");
        Ok(())
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Serve one handler over stdin/stdout until the client disconnects
pub async fn serve_stdio(handler: ReadLaterHandler) -> anyhow::Result<()> {
    info!("[Gateway] Serving MCP over stdio");
    let service = handler
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start stdio MCP server")?;
    let reason = service.waiting().await?;
    info!("[Gateway] stdio session ended: {:?}", reason);
    Ok(())
}
