//! Prefixed identifiers
//!
//! Every entity in the portal carries an opaque identifier of the form
//! `{prefix}_{random}` where the random part is at least 96 bits encoded as
//! URL-safe base64. The newtypes generated here keep user, organisation and
//! case identifiers from being mixed up at call sites.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::RngCore;

pub const USER_PREFIX: &str = "usr";
pub const ORGANISATION_PREFIX: &str = "org";
pub const CASE_PREFIX: &str = "case";

/// Generate a prefixed ID with 96 bits of entropy
///
/// # Example
/// ```
/// use acclaim_core::id::generate_prefixed_id;
///
/// let id = generate_prefixed_id("org");
/// assert!(id.starts_with("org_"));
/// ```
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);

    format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Validate that a prefixed ID has the expected format
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12,
        Err(_) => false,
    }
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }

            pub fn new_random() -> Self {
                Self($crate::id::generate_prefixed_id($prefix))
            }

            pub fn into_inner(self) -> String {
                self.0
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the value looks like an identifier minted by this crate.
            pub fn is_valid(&self) -> bool {
                $crate::id::validate_prefixed_id(&self.0, $prefix)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

prefixed_id!(
    /// A stable, opaque identifier for a portal user
    UserId,
    USER_PREFIX
);

prefixed_id!(
    /// Identifier of a tenant organisation
    OrganisationId,
    ORGANISATION_PREFIX
);

prefixed_id!(
    /// Identifier of a debt-recovery case
    CaseId,
    CASE_PREFIX
);
