//! Storage for login rate-limit records.
//!
//! The limiter never reaches for process-global state; it is handed a
//! [`RateLimitStore`]. [`InMemoryRateLimitStore`] serves single-instance
//! deployments. Multi-instance deployments inject a shared implementation
//! (see the SQLite backend) so every node sees the same counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{Error, storage::LoginAttemptRecord};

#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    /// Fetch the record for an identifier
    async fn get(&self, identifier: &str) -> Result<Option<LoginAttemptRecord>, Error>;

    /// Insert or replace the record keyed by `record.identifier`
    async fn put(&self, record: LoginAttemptRecord) -> Result<(), Error>;

    /// Delete the record for an identifier
    ///
    /// # Returns
    ///
    /// `true` if a record was present.
    async fn remove(&self, identifier: &str) -> Result<bool, Error>;

    /// Every tracked record, in no particular order
    async fn list(&self) -> Result<Vec<LoginAttemptRecord>, Error>;

    /// Delete records that are idle and not under an active lock.
    ///
    /// A record is removed only when both hold:
    /// - it has no lock, or its lock ended before `lock_ended_before`
    /// - its last attempt was before `last_attempt_before`
    ///
    /// # Returns
    ///
    /// The number of records removed.
    async fn remove_stale(
        &self,
        lock_ended_before: DateTime<Utc>,
        last_attempt_before: DateTime<Utc>,
    ) -> Result<u64, Error>;
}

/// Is `record` eligible for the periodic sweep?
pub fn is_stale(
    record: &LoginAttemptRecord,
    lock_ended_before: DateTime<Utc>,
    last_attempt_before: DateTime<Utc>,
) -> bool {
    let lock_cleared = record
        .locked_until
        .is_none_or(|until| until < lock_ended_before);
    lock_cleared && record.last_attempt < last_attempt_before
}

/// Process-local store backed by a concurrent hash map.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: DashMap<String, LoginAttemptRecord>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, identifier: &str) -> Result<Option<LoginAttemptRecord>, Error> {
        Ok(self.records.get(identifier).map(|r| r.value().clone()))
    }

    async fn put(&self, record: LoginAttemptRecord) -> Result<(), Error> {
        self.records.insert(record.identifier.clone(), record);
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> Result<bool, Error> {
        Ok(self.records.remove(identifier).is_some())
    }

    async fn list(&self) -> Result<Vec<LoginAttemptRecord>, Error> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }

    async fn remove_stale(
        &self,
        lock_ended_before: DateTime<Utc>,
        last_attempt_before: DateTime<Utc>,
    ) -> Result<u64, Error> {
        // counted inside retain, since logins may insert while the sweep runs
        let mut removed = 0u64;
        self.records.retain(|_, record| {
            let stale = is_stale(record, lock_ended_before, last_attempt_before);
            if stale {
                removed += 1;
            }
            !stale
        });
        Ok(removed)
    }
}
