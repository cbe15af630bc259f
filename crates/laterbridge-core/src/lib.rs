//! # Laterbridge Core Library
//!
//! Domain types shared by the provider client and the gateway.
//!
//! ## Modules
//!
//! - `branding` - Product naming and environment variable names
//! - `config` - Provider endpoints, timeouts and QR polling bounds
//! - `domain` - Credential pair, reading-list items, feed pages, QR sessions
//! - `error` - Provider error taxonomy

pub mod branding;
pub mod config;
pub mod domain;
pub mod error;

pub use config::ProviderConfig;
pub use domain::*;
pub use error::{ConfigError, ProviderError};
