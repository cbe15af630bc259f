//! Laterbridge command line
//!
//! `laterbridge stdio` serves one local MCP client with credentials from the
//! environment. `laterbridge http` runs the Streamable HTTP gateway with the
//! QR OAuth bridge.

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use laterbridge_client::{build_http_client, ReadLaterClient, TokenFileObserver};
use laterbridge_core::{branding, CredentialPair, ProviderConfig};
use laterbridge_gateway::{serve_stdio, GatewayConfig, GatewayServer, ReadLaterHandler};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "laterbridge")]
#[command(about = "Read-later library tools for MCP clients")]
#[command(version)]
struct Cli {
    /// Directory for daily rolling log files
    #[arg(long, global = true, env = "LATERBRIDGE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over stdin/stdout
    Stdio {
        /// JSON file holding {access_token, refresh_token}; rewritten on rotation
        #[arg(long, env = "LATERBRIDGE_TOKEN_FILE")]
        token_file: Option<PathBuf>,
    },
    /// Serve MCP over Streamable HTTP with the QR login bridge
    Http {
        #[arg(long, env = "LATERBRIDGE_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(long, env = "LATERBRIDGE_PORT", default_value_t = branding::DEFAULT_HTTP_PORT)]
        port: u16,

        /// Keep MCP sessions with server-sent event streams
        #[arg(long, env = "LATERBRIDGE_STATEFUL")]
        stateful: bool,

        /// Externally visible origin (e.g. https://bridge.example.com)
        #[arg(long, env = "LATERBRIDGE_PUBLIC_URL")]
        public_url: Option<String>,

        /// Do not send CORS headers
        #[arg(long)]
        no_cors: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _guard = logging::init_tracing(cli.log_dir.as_deref())?;

    let provider = ProviderConfig::from_env().context("invalid provider configuration")?;
    info!(
        "[Main] {} v{} (provider {})",
        branding::DISPLAY_NAME,
        env!("CARGO_PKG_VERSION"),
        provider.api_base
    );

    match cli.command {
        Command::Stdio { token_file } => run_stdio(provider, token_file).await,
        Command::Http {
            host,
            port,
            stateful,
            public_url,
            no_cors,
        } => {
            let mut config = GatewayConfig {
                host,
                port,
                stateful,
                enable_cors: !no_cors,
                ..Default::default()
            }
            .with_env();
            if public_url.is_some() {
                config.public_url = public_url;
            }
            run_http(config, provider).await
        }
    }
}

async fn run_stdio(provider: ProviderConfig, token_file: Option<PathBuf>) -> anyhow::Result<()> {
    let provider = Arc::new(provider);
    let http = build_http_client(&provider).context("failed to build provider HTTP client")?;

    let handler = match stdio_credentials(token_file.as_deref()).await {
        Some(pair) => {
            info!("[Main] Using credentials {}", pair.fingerprint());
            let mut client = ReadLaterClient::new(http.clone(), provider.clone(), pair);
            if let Some(path) = token_file {
                info!("[Main] Rotated tokens will be written to {}", path.display());
                client = client.with_observer(Arc::new(TokenFileObserver::new(path)));
            }
            ReadLaterHandler::with_session(provider, http, client)
        }
        None => {
            warn!(
                "[Main] No credentials configured; set {} and {}",
                branding::env_var("ACCESS_TOKEN"),
                branding::env_var("REFRESH_TOKEN")
            );
            ReadLaterHandler::per_request(provider, http)
        }
    };

    serve_stdio(handler).await
}

/// A previously rotated token file wins over the environment
async fn stdio_credentials(token_file: Option<&Path>) -> Option<CredentialPair> {
    if let Some(path) = token_file {
        match TokenFileObserver::load(path).await {
            Ok(pair) => return Some(pair),
            Err(e) => debug!("[Main] No usable token file at {}: {:#}", path.display(), e),
        }
    }

    let read = |suffix: &str| {
        std::env::var(branding::env_var(suffix))
            .ok()
            .filter(|v| !v.trim().is_empty())
    };
    let pair = CredentialPair::new(read("ACCESS_TOKEN")?, read("REFRESH_TOKEN")?);
    pair.is_complete().then_some(pair)
}

async fn run_http(config: GatewayConfig, provider: ProviderConfig) -> anyhow::Result<()> {
    let server = GatewayServer::new(config, provider)?;
    let shutdown = server.shutdown_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[Main] Shutdown requested");
            shutdown.cancel();
        }
    });

    server.run().await
}
