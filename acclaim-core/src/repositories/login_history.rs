use async_trait::async_trait;

use crate::{Error, storage::LoginHistoryEntry};

/// Append-only record of successful logins.
#[async_trait]
pub trait LoginHistoryRepository: Send + Sync + 'static {
    /// Append one successful login
    async fn record(&self, entry: LoginHistoryEntry) -> Result<(), Error>;

    /// Whether no prior entry for `email` has exactly this `(ip_address, user_agent)` pair.
    ///
    /// Email matching is case-insensitive. Must not write anything.
    async fn is_new_location(
        &self,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<bool, Error>;
}
