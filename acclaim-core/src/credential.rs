//! Stored credentials and their verification
//!
//! An account may carry an administrator-issued temporary password, a
//! permanent password hash, or both. Each is represented as a [`Credential`]
//! variant and checked through [`Credential::verify`]; the order in which
//! [`StoredCredentials::credentials`] yields them is the precedence rule.
//!
//! Two hash formats are understood:
//!
//! * PHC strings (argon2) produced by [`hash_password`]
//! * legacy digests of the form `sha256$<salt>$<hex(sha256(salt || password))>`
//!
//! Callers never need to know which one an account uses.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::{
    crypto::{constant_time_compare, sha256_hex},
    error::CryptoError,
};

/// Fixed prefix identifying legacy salted SHA256 hashes.
pub const LEGACY_SHA256_PREFIX: &str = "sha256$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashScheme {
    Argon2,
    LegacySha256,
}

impl HashScheme {
    pub fn detect(stored: &str) -> Self {
        if stored.starts_with(LEGACY_SHA256_PREFIX) {
            HashScheme::LegacySha256
        } else {
            HashScheme::Argon2
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Temporary(String),
    Hashed { scheme: HashScheme, value: String },
}

impl Credential {
    pub fn hashed(value: impl Into<String>) -> Self {
        let value = value.into();
        Credential::Hashed {
            scheme: HashScheme::detect(&value),
            value,
        }
    }

    /// Check `candidate` against this credential.
    pub fn verify(&self, candidate: &str) -> bool {
        match self {
            Credential::Temporary(expected) => {
                constant_time_compare(expected.as_bytes(), candidate.as_bytes())
            }
            Credential::Hashed {
                scheme: HashScheme::Argon2,
                value,
            } => password_auth::verify_password(candidate, value).is_ok(),
            Credential::Hashed {
                scheme: HashScheme::LegacySha256,
                value,
            } => verify_legacy(candidate, value),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Temporary(_) => "temporary",
            Credential::Hashed { .. } => "hashed",
        }
    }
}

/// Password material for one account as loaded from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub temporary_password: Option<String>,
    pub password_hash: Option<String>,
}

impl StoredCredentials {
    /// Credentials in the order they are tried. Empty values are skipped.
    pub fn credentials(&self) -> Vec<Credential> {
        let temporary = self
            .temporary_password
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| Credential::Temporary(t.to_string()));
        let hashed = self
            .password_hash
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(Credential::hashed);

        temporary.into_iter().chain(hashed).collect()
    }

    /// Return the first credential accepting `candidate`.
    pub fn verify(&self, candidate: &str) -> Option<Credential> {
        self.credentials().into_iter().find(|c| c.verify(candidate))
    }
}

/// Hash a password for storage using argon2.
pub fn hash_password(password: &str) -> String {
    password_auth::generate_hash(password)
}

/// Argon2 hash of a random throwaway password, generated on first use.
static UNKNOWN_ACCOUNT_HASH: LazyLock<String> = LazyLock::new(|| {
    let throwaway = crate::crypto::generate_secure_token();
    password_auth::generate_hash(throwaway)
});

/// Run one argon2 verification of `candidate` against a hash no password
/// matches. Logins for unknown accounts call this so they cost as much as a
/// wrong password.
pub fn verify_unknown_account(candidate: &str) -> bool {
    password_auth::verify_password(candidate, &UNKNOWN_ACCOUNT_HASH).is_ok()
}

/// Produce a legacy-format hash. Only used to seed accounts migrated from the
/// previous portal.
pub fn legacy_hash(salt: &str, password: &str) -> String {
    let digest = sha256_hex(format!("{salt}{password}").as_bytes());
    format!("{LEGACY_SHA256_PREFIX}{salt}${digest}")
}

/// Check that an externally produced hash is in a format [`Credential::verify`]
/// understands.
pub fn check_stored_hash(stored: &str) -> Result<HashScheme, CryptoError> {
    match HashScheme::detect(stored) {
        HashScheme::LegacySha256 => {
            let digest = stored
                .strip_prefix(LEGACY_SHA256_PREFIX)
                .and_then(|rest| rest.split_once('$'))
                .map(|(_, digest)| digest)
                .ok_or_else(|| {
                    CryptoError::MalformedCredential("legacy hash has no salt".to_string())
                })?;
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(CryptoError::MalformedCredential(
                    "legacy digest must be 64 hex characters".to_string(),
                ));
            }
            Ok(HashScheme::LegacySha256)
        }
        HashScheme::Argon2 => password_auth::is_hash_obsolete(stored)
            .map(|_| HashScheme::Argon2)
            .map_err(|_| CryptoError::MalformedCredential("not a PHC hash string".to_string())),
    }
}

fn verify_legacy(candidate: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored
        .strip_prefix(LEGACY_SHA256_PREFIX)
        .and_then(|rest| rest.split_once('$'))
    else {
        tracing::warn!("Malformed legacy password hash");
        return false;
    };

    let computed = sha256_hex(format!("{salt}{candidate}").as_bytes());
    constant_time_compare(computed.as_bytes(), expected.as_bytes())
}
