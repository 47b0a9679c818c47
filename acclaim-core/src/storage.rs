//! Records exchanged with the persistence layer and the configuration that
//! governs them.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::utilities::RequiredFieldExt,
    id::{OrganisationId, UserId},
};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub organisation_id: Option<OrganisationId>,
    pub is_admin: bool,
    pub must_change_password: bool,
    pub login_notifications_enabled: bool,
}

impl NewUser {
    pub fn builder() -> NewUserBuilder {
        NewUserBuilder::default()
    }

    pub fn new(email: &str, name: &str) -> Self {
        NewUser {
            id: UserId::new_random(),
            email: email.to_string(),
            name: name.to_string(),
            organisation_id: None,
            is_admin: false,
            must_change_password: false,
            login_notifications_enabled: true,
        }
    }
}

#[derive(Default)]
pub struct NewUserBuilder {
    id: Option<UserId>,
    email: Option<String>,
    name: Option<String>,
    organisation_id: Option<OrganisationId>,
    is_admin: bool,
    must_change_password: bool,
    login_notifications_enabled: Option<bool>,
}

impl NewUserBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn organisation_id(mut self, organisation_id: OrganisationId) -> Self {
        self.organisation_id = Some(organisation_id);
        self
    }

    pub fn is_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn must_change_password(mut self, must_change_password: bool) -> Self {
        self.must_change_password = must_change_password;
        self
    }

    pub fn login_notifications_enabled(mut self, enabled: bool) -> Self {
        self.login_notifications_enabled = Some(enabled);
        self
    }

    pub fn build(self) -> Result<NewUser, Error> {
        let email = self.email.require_field("Email")?;
        Ok(NewUser {
            id: self.id.unwrap_or_else(UserId::new_random),
            name: self.name.unwrap_or_else(|| email.clone()),
            email,
            organisation_id: self.organisation_id,
            is_admin: self.is_admin,
            must_change_password: self.must_change_password,
            login_notifications_enabled: self.login_notifications_enabled.unwrap_or(true),
        })
    }
}

/// Failed-attempt state for one client identifier (the source IP).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttemptRecord {
    pub identifier: String,
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_attempt: DateTime<Utc>,
    pub associated_account: Option<String>,
}

impl LoginAttemptRecord {
    pub fn new(identifier: &str, now: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.to_string(),
            attempts: 0,
            locked_until: None,
            last_attempt: now,
            associated_account: None,
        }
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// A lock was set and its deadline has passed.
    pub fn lock_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until <= now)
    }

    /// Whole seconds until the lock lifts, rounded up.
    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> Option<u64> {
        let until = self.locked_until.filter(|until| *until > now)?;
        let millis = (until - now).num_milliseconds().max(0) as u64;
        Some(millis.div_ceil(1000))
    }
}

/// Result of a lock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    pub locked: bool,
    pub remaining_seconds: Option<u64>,
}

impl LockStatus {
    pub fn unlocked() -> Self {
        Self {
            locked: false,
            remaining_seconds: None,
        }
    }
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAttemptOutcome {
    pub locked: bool,
    pub attempts_remaining: u32,
    /// This attempt is the one that set the lock.
    pub newly_locked: bool,
    pub remaining_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStats {
    pub total_tracked: usize,
    pub currently_locked: usize,
    pub max_attempts: u32,
    pub lockout_duration_seconds: i64,
}

/// Configuration for the login rate limiter
///
/// # Example
///
/// ```rust
/// use acclaim_core::storage::RateLimitConfig;
///
/// let config = RateLimitConfig::default().with_max_attempts(3);
/// assert_eq!(config.max_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// When false every check reports unlocked and nothing is recorded
    pub enabled: bool,
    /// Failed attempts that trigger a lock
    pub max_attempts: u32,
    /// How long a lock lasts
    pub lockout_duration: Duration,
    /// How often the background sweep runs
    pub sweep_interval: std::time::Duration,
    /// Idle time after which an unlocked record is swept
    pub idle_retention: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            lockout_duration: Duration::minutes(15),
            sweep_interval: std::time::Duration::from_secs(5 * 60),
            idle_retention: Duration::hours(1),
        }
    }
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    pub fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_idle_retention(mut self, retention: Duration) -> Self {
        self.idle_retention = retention;
        self
    }
}

/// One successful login, used for new-location detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginHistoryEntry {
    pub email: String,
    pub ip_address: String,
    pub user_agent: String,
    pub logged_in_at: DateTime<Utc>,
}

/// Audit row for a login attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttemptLog {
    pub email: String,
    pub success: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivity {
    pub user_id: UserId,
    pub action: String,
    pub details: String,
    pub ip_address: String,
    pub user_agent: String,
}

/// Security-relevant audit event, e.g. an IP lockout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub table_name: String,
    pub record_id: String,
    pub operation: String,
    pub description: String,
    pub user_id: Option<UserId>,
    pub ip_address: Option<String>,
}
