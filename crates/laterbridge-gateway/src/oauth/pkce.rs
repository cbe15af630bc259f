//! PKCE (Proof Key for Code Exchange)
//!
//! RFC 7636 verification. The challenge travels inside the authorization
//! code envelope, so verification needs no server-side lookup.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

/// S256 challenge for a verifier
pub fn challenge_for(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verify a `code_verifier` against the stored challenge.
/// The method defaults to S256; unknown methods never verify.
pub fn verify(code_verifier: &str, code_challenge: &str, method: Option<&str>) -> bool {
    match method.unwrap_or("S256") {
        "S256" => challenge_for(code_verifier) == code_challenge,
        "plain" => code_verifier == code_challenge,
        _ => false,
    }
}
