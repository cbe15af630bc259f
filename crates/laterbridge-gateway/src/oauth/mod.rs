//! Stateless OAuth bridge
//!
//! Turns the provider's QR login into a standard authorization-code flow:
//! - `envelope`: credential pair sealed into codes and bearer tokens
//! - `session`: pending QR logins keyed by an unguessable id
//! - `pkce`: code verifier checks against the challenge carried in the code
//! - `dcr`: no-op dynamic client registration
//! - `discovery`: RFC 8414 / RFC 9728 metadata

pub mod dcr;
pub mod discovery;
pub mod envelope;
pub mod pkce;
pub mod session;

pub use dcr::{register, DcrRequest, DcrResponse};
pub use discovery::{AuthorizationServerMetadata, ProtectedResourceMetadata};
pub use envelope::{CodeGrant, EnvelopeError, EnvelopeKind, EnvelopeSealer};
pub use session::{generate_session_id, LoginSessionStore, MemoryLoginStore, PendingLogin};
