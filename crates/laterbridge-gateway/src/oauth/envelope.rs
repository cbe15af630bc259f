//! Credential envelopes
//!
//! The bridge never stores tokens. The provider pair travels inside the
//! authorization code and later inside the bearer token itself, so any
//! gateway instance can open it. Envelopes look like `lb1.<kind>.<payload>`.
//!
//! With a sealing key the payload is AES-256-GCM (nonce prepended, header as
//! associated data) so intermediaries can neither read nor alter it. Without
//! a key the payload is plain base64url JSON.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use laterbridge_core::CredentialPair;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

pub const ENVELOPE_VERSION: &str = "lb1";

/// Size of the sealing key (32 bytes = 256 bits).
pub const KEY_SIZE: usize = 32;

const NONCE_SIZE: usize = 12;

/// Authorization codes are only good for this long after issue
pub const CODE_TTL_SECS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Authorization code returned to the redirect URI
    Code,
    /// Bearer token presented to `/mcp`
    Access,
    /// Refresh token presented to `/token`
    Refresh,
}

impl EnvelopeKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Access => "at",
            Self::Refresh => "rt",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope is malformed")]
    Malformed,

    #[error("expected {expected} envelope")]
    WrongKind { expected: &'static str },

    #[error("envelope could not be opened")]
    Unreadable,

    #[error("authorization code has expired")]
    Expired,

    #[error("sealing key must be {KEY_SIZE} bytes of hex")]
    InvalidKey,

    #[error("sealing failed")]
    Seal,
}

/// Contents of an authorization code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeGrant {
    pub credentials: CredentialPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    /// Unix seconds
    pub issued_at: i64,
}

impl CodeGrant {
    pub fn new(credentials: CredentialPair) -> Self {
        Self {
            credentials,
            code_challenge: None,
            code_challenge_method: None,
            redirect_uri: None,
            issued_at: Utc::now().timestamp(),
        }
    }
}

pub struct EnvelopeSealer {
    key: Option<LessSafeKey>,
    rng: SystemRandom,
}

impl EnvelopeSealer {
    /// Envelopes are encoded but not encrypted
    pub fn plain() -> Self {
        Self {
            key: None,
            rng: SystemRandom::new(),
        }
    }

    pub fn with_key(key: &[u8; KEY_SIZE]) -> Result<Self, EnvelopeError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| EnvelopeError::InvalidKey)?;
        Ok(Self {
            key: Some(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Key from a 64-character hex string
    pub fn from_hex(hex_key: &str) -> Result<Self, EnvelopeError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| EnvelopeError::InvalidKey)?;
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| EnvelopeError::InvalidKey)?;
        Self::with_key(&key)
    }

    pub fn is_sealed(&self) -> bool {
        self.key.is_some()
    }

    pub fn seal_code(&self, grant: &CodeGrant) -> Result<String, EnvelopeError> {
        self.seal(EnvelopeKind::Code, grant)
    }

    pub fn open_code(&self, code: &str) -> Result<CodeGrant, EnvelopeError> {
        let grant: CodeGrant = self.open(EnvelopeKind::Code, code)?;
        let age = Utc::now().timestamp() - grant.issued_at;
        if !(0..=CODE_TTL_SECS).contains(&age) {
            return Err(EnvelopeError::Expired);
        }
        Ok(grant)
    }

    pub fn seal_access(&self, pair: &CredentialPair) -> Result<String, EnvelopeError> {
        self.seal(EnvelopeKind::Access, pair)
    }

    pub fn open_access(&self, token: &str) -> Result<CredentialPair, EnvelopeError> {
        self.open(EnvelopeKind::Access, token)
    }

    pub fn seal_refresh(&self, pair: &CredentialPair) -> Result<String, EnvelopeError> {
        self.seal(EnvelopeKind::Refresh, pair)
    }

    pub fn open_refresh(&self, token: &str) -> Result<CredentialPair, EnvelopeError> {
        self.open(EnvelopeKind::Refresh, token)
    }

    fn seal<T: Serialize>(&self, kind: EnvelopeKind, payload: &T) -> Result<String, EnvelopeError> {
        let header = header(kind);
        let mut bytes = serde_json::to_vec(payload).map_err(|_| EnvelopeError::Seal)?;

        if let Some(key) = &self.key {
            let mut nonce_bytes = [0u8; NONCE_SIZE];
            self.rng
                .fill(&mut nonce_bytes)
                .map_err(|_| EnvelopeError::Seal)?;
            let nonce = Nonce::assume_unique_for_key(nonce_bytes);
            key.seal_in_place_append_tag(nonce, Aad::from(header.as_bytes()), &mut bytes)
                .map_err(|_| EnvelopeError::Seal)?;

            let mut sealed = nonce_bytes.to_vec();
            sealed.extend_from_slice(&bytes);
            bytes = sealed;
        }

        Ok(format!("{}.{}", header, URL_SAFE_NO_PAD.encode(bytes)))
    }

    fn open<T: DeserializeOwned>(&self, kind: EnvelopeKind, envelope: &str) -> Result<T, EnvelopeError> {
        let mut parts = envelope.trim().splitn(3, '.');
        let (Some(version), Some(tag), Some(body)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(EnvelopeError::Malformed);
        };
        if version != ENVELOPE_VERSION {
            return Err(EnvelopeError::Malformed);
        }
        if tag != kind.tag() {
            return Err(EnvelopeError::WrongKind {
                expected: kind.tag(),
            });
        }

        let mut bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| EnvelopeError::Malformed)?;

        let plaintext: &[u8] = match &self.key {
            Some(key) => {
                if bytes.len() < NONCE_SIZE + AES_256_GCM.tag_len() {
                    return Err(EnvelopeError::Unreadable);
                }
                let (nonce_bytes, ciphertext) = bytes.split_at_mut(NONCE_SIZE);
                let nonce_array: [u8; NONCE_SIZE] = (&*nonce_bytes)
                    .try_into()
                    .map_err(|_| EnvelopeError::Unreadable)?;
                let nonce = Nonce::assume_unique_for_key(nonce_array);
                let header = header(kind);
                key.open_in_place(nonce, Aad::from(header.as_bytes()), ciphertext)
                    .map_err(|_| EnvelopeError::Unreadable)?
            }
            None => &bytes,
        };

        serde_json::from_slice(plaintext).map_err(|_| EnvelopeError::Unreadable)
    }
}

fn header(kind: EnvelopeKind) -> String {
    format!("{}.{}", ENVELOPE_VERSION, kind.tag())
}
