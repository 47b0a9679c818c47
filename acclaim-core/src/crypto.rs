//! Token generation and constant-time comparison
//!
//! Session tokens are 256-bit random values handed to the client once. Only
//! their SHA256 digest is persisted, so a leaked session table cannot be
//! replayed. SHA256 is sufficient here because the input is high-entropy;
//! passwords go through [`crate::credential`] instead.

use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a 256-bit random token encoded as URL-safe base64 (43 characters).
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Hex-encoded SHA256 digest of `token`, used as the storage key for sessions.
pub fn hash_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

pub(crate) fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Compare two byte slices without short-circuiting on the first mismatch.
///
/// Slices of different length compare unequal immediately; length is not
/// treated as secret.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
