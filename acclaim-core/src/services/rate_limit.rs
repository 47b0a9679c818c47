//! Login rate limiting by source identifier.
//!
//! Failed logins are counted per client identifier, which is the source IP
//! address rather than the attempted account. One source cannot spread
//! guesses across many accounts, at the cost of users behind a shared NAT
//! being able to lock each other out.
//!
//! # Example
//!
//! ```rust,ignore
//! use acclaim_core::repositories::InMemoryRateLimitStore;
//! use acclaim_core::services::LoginRateLimiter;
//! use acclaim_core::storage::RateLimitConfig;
//!
//! let limiter = LoginRateLimiter::new(
//!     Arc::new(InMemoryRateLimitStore::new()),
//!     RateLimitConfig::default(),
//! );
//!
//! if limiter.is_locked("203.0.113.7").await?.locked {
//!     // respond 429 without touching credentials
//! }
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error,
    repositories::RateLimitStore,
    storage::{
        FailedAttemptOutcome, LockStatus, LoginAttemptRecord, RateLimitConfig, RateLimitStats,
    },
};

/// Per-identifier failed-attempt counter with time-boxed lockout.
///
/// Checks and updates are read-then-write against the store. Concurrent
/// failures from one identifier may under-count by the width of the race.
pub struct LoginRateLimiter<S: RateLimitStore> {
    store: Arc<S>,
    config: RateLimitConfig,
}

impl<S: RateLimitStore> LoginRateLimiter<S> {
    pub fn new(store: Arc<S>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Check whether `identifier` is currently locked out.
    ///
    /// A lock whose deadline has passed is cleared here, so the next failure
    /// starts a fresh count.
    pub async fn is_locked(&self, identifier: &str) -> Result<LockStatus, Error> {
        if !self.config.enabled {
            return Ok(LockStatus::unlocked());
        }

        let now = Utc::now();
        match self.store.get(identifier).await? {
            Some(record) if record.is_locked_at(now) => Ok(LockStatus {
                locked: true,
                remaining_seconds: record.remaining_seconds_at(now),
            }),
            Some(record) if record.lock_expired_at(now) => {
                self.store.remove(identifier).await?;
                tracing::debug!(identifier = %identifier, "Login lock expired");
                Ok(LockStatus::unlocked())
            }
            _ => Ok(LockStatus::unlocked()),
        }
    }

    /// Record a failed login from `identifier`.
    ///
    /// Reaching `max_attempts` sets a lock for `lockout_duration`. Calls made
    /// while a lock is active change nothing and report the existing lock.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The source identifier (IP address)
    /// * `account` - The email that was attempted, kept for administrators
    pub async fn record_failed_attempt(
        &self,
        identifier: &str,
        account: Option<&str>,
    ) -> Result<FailedAttemptOutcome, Error> {
        if !self.config.enabled {
            return Ok(FailedAttemptOutcome {
                locked: false,
                attempts_remaining: self.config.max_attempts,
                newly_locked: false,
                remaining_seconds: None,
            });
        }

        let now = Utc::now();
        let existing = self.store.get(identifier).await?;

        if let Some(record) = existing.as_ref().filter(|r| r.is_locked_at(now)) {
            return Ok(FailedAttemptOutcome {
                locked: true,
                attempts_remaining: 0,
                newly_locked: false,
                remaining_seconds: record.remaining_seconds_at(now),
            });
        }

        let mut record = match existing {
            Some(record) if !record.lock_expired_at(now) => record,
            _ => LoginAttemptRecord::new(identifier, now),
        };

        record.attempts = record.attempts.saturating_add(1);
        record.last_attempt = now;
        if let Some(account) = account {
            record.associated_account = Some(account.to_string());
        }

        let newly_locked = record.attempts >= self.config.max_attempts;
        if newly_locked {
            record.locked_until = Some(now + self.config.lockout_duration);
            tracing::warn!(
                identifier = %identifier,
                attempts = record.attempts,
                lockout_seconds = self.config.lockout_duration.num_seconds(),
                "Login source locked out after repeated failures"
            );
        }

        let outcome = FailedAttemptOutcome {
            locked: newly_locked,
            attempts_remaining: self.config.max_attempts.saturating_sub(record.attempts),
            newly_locked,
            remaining_seconds: record.remaining_seconds_at(now),
        };

        self.store.put(record).await?;

        Ok(outcome)
    }

    /// Clear all state for `identifier` after a successful login.
    pub async fn record_successful_login(&self, identifier: &str) -> Result<(), Error> {
        self.store.remove(identifier).await?;
        Ok(())
    }

    /// Identifiers under an active lock, most recent attempt first.
    pub async fn locked_identifiers(&self) -> Result<Vec<LoginAttemptRecord>, Error> {
        let now = Utc::now();
        let mut locked: Vec<_> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|r| r.is_locked_at(now))
            .collect();
        locked.sort_by(|a, b| b.last_attempt.cmp(&a.last_attempt));
        Ok(locked)
    }

    /// Every tracked identifier, most recent attempt first.
    pub async fn tracked_identifiers(&self) -> Result<Vec<LoginAttemptRecord>, Error> {
        let mut tracked = self.store.list().await?;
        tracked.sort_by(|a, b| b.last_attempt.cmp(&a.last_attempt));
        Ok(tracked)
    }

    /// Force-unlock an identifier by discarding its record.
    ///
    /// # Returns
    ///
    /// `true` if the identifier was tracked.
    pub async fn unlock(&self, identifier: &str) -> Result<bool, Error> {
        let removed = self.store.remove(identifier).await?;
        if removed {
            tracing::info!(identifier = %identifier, "Login source unlocked by administrator");
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<RateLimitStats, Error> {
        let now = Utc::now();
        let records = self.store.list().await?;
        Ok(RateLimitStats {
            total_tracked: records.len(),
            currently_locked: records.iter().filter(|r| r.is_locked_at(now)).count(),
            max_attempts: self.config.max_attempts,
            lockout_duration_seconds: self.config.lockout_duration.num_seconds(),
        })
    }

    /// Remove records that are both idle and free of any recent lock.
    pub async fn sweep(&self) -> Result<u64, Error> {
        let horizon = Utc::now() - self.config.idle_retention;
        self.store.remove_stale(horizon, horizon).await
    }

    /// Start the background sweep task.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    pub fn start_sweep_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let limiter = Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        };

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(limiter.config.sweep_interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match limiter.sweep().await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Swept idle login rate-limit records");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to sweep login rate-limit records");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login rate-limit sweep task");
                        break;
                    }
                }
            }
        })
    }
}
