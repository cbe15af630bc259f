//! MCP surface: tools, handler and credential extraction

pub mod credentials;
pub mod format;
pub mod handler;
pub mod tools;

pub use credentials::{mcp_auth_middleware, resolve_credentials, CredentialRejection};
pub use handler::ReadLaterHandler;
