//! Laterbridge Gateway
//!
//! Exposes the reading-list tools to MCP clients:
//! - `mcp`: tool catalogue, `ServerHandler` and credential extraction
//! - `oauth`: stateless QR login bridge (envelopes, PKCE, DCR, discovery)
//! - `server`: axum router, Streamable HTTP and stdio transports
//! - `logging`: request correlation

pub mod logging;
pub mod mcp;
pub mod oauth;
pub mod server;

pub use mcp::ReadLaterHandler;
pub use server::{serve_stdio, AppState, GatewayConfig, GatewayServer};
