//! Builder pattern for constructing Acclaim instances
//!
//! [`AcclaimBuilder`] checks at compile time that storage was configured
//! before [`build`](AcclaimBuilder::build) can be called.
//!
//! # Example
//!
//! ```rust,no_run
//! use acclaim::AcclaimBuilder;
//! use chrono::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let acclaim = AcclaimBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_session_expiry(Duration::hours(4))
//!         .with_administrator_email("support@acclaim.example")
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     acclaim.health_check().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use acclaim_core::validation::validate_email;
use chrono::Duration;

use crate::{
    AccessConfig, Acclaim, DEFAULT_OUTBOX_CAPACITY, InMemoryRateLimitStore, RateLimitConfig,
    RateLimitStore, RepositoryProvider, SessionConfig,
};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building an Acclaim instance.
#[derive(Debug, thiserror::Error)]
pub enum AcclaimBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for [`Acclaim`].
///
/// Login rate-limit counters default to an in-memory store. Call
/// [`with_rate_limit_store`](Self::with_rate_limit_store) (or
/// `with_sqlite_rate_limits` on SQLite storage) when several instances must
/// share lockouts.
pub struct AcclaimBuilder<Storage, S: RateLimitStore = InMemoryRateLimitStore> {
    storage: Storage,
    rate_limit_store: Arc<S>,
    session_config: SessionConfig,
    rate_limit_config: RateLimitConfig,
    access_config: AccessConfig,
    notification_capacity: usize,
    apply_migrations: bool,
}

impl Default for AcclaimBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl AcclaimBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Session expiry: 8 hours
    /// - Rate limiting: enabled, 5 attempts, 15 minute lockout, in-memory store
    /// - Administrator email: `admin@acclaim.local`
    /// - Notification outbox: 1024 pending notifications
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            rate_limit_store: Arc::new(InMemoryRateLimitStore::new()),
            session_config: SessionConfig::default(),
            rate_limit_config: RateLimitConfig::default(),
            access_config: AccessConfig::default(),
            notification_capacity: DEFAULT_OUTBOX_CAPACITY,
            apply_migrations: false,
        }
    }
}

impl<S: RateLimitStore> AcclaimBuilder<NoStorage, S> {
    /// Use an already constructed repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> AcclaimBuilder<WithStorage<R>, S> {
        AcclaimBuilder {
            storage: WithStorage { repositories },
            rate_limit_store: self.rate_limit_store,
            session_config: self.session_config,
            rate_limit_config: self.rate_limit_config,
            access_config: self.access_config,
            notification_capacity: self.notification_capacity,
            apply_migrations: self.apply_migrations,
        }
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "sqlite")]
impl<S: RateLimitStore> AcclaimBuilder<NoStorage, S> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<AcclaimBuilder<WithStorage<crate::SqliteRepositoryProvider>, S>, AcclaimBuilderError>
    {
        let pool = acclaim_storage_sqlite::connect(url)
            .await
            .map_err(|e| AcclaimBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_sqlite_pool(pool))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> AcclaimBuilder<WithStorage<crate::SqliteRepositoryProvider>, S> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

#[cfg(feature = "sqlite")]
impl<S: RateLimitStore> AcclaimBuilder<WithStorage<crate::SqliteRepositoryProvider>, S> {
    /// Keep login rate-limit counters in the same SQLite database as
    /// everything else.
    pub fn with_sqlite_rate_limits(
        self,
    ) -> AcclaimBuilder<WithStorage<crate::SqliteRepositoryProvider>, crate::SqliteRateLimitStore>
    {
        let store = Arc::new(self.storage.repositories.rate_limit_store());
        self.with_rate_limit_store(store)
    }
}

// ============================================================================
// Configuration Methods
// ============================================================================

impl<Storage, S: RateLimitStore> AcclaimBuilder<Storage, S> {
    /// Replace the store holding login rate-limit counters.
    pub fn with_rate_limit_store<S2: RateLimitStore>(
        self,
        store: Arc<S2>,
    ) -> AcclaimBuilder<Storage, S2> {
        AcclaimBuilder {
            storage: self.storage,
            rate_limit_store: store,
            session_config: self.session_config,
            rate_limit_config: self.rate_limit_config,
            access_config: self.access_config,
            notification_capacity: self.notification_capacity,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Set the session expiration duration.
    ///
    /// Default: 8 hours
    pub fn with_session_expiry(mut self, duration: Duration) -> Self {
        self.session_config.expires_in = duration;
        self
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Configure login rate limiting.
    ///
    /// Default: enabled with 5 attempts and a 15 minute lockout
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use acclaim::{AcclaimBuilder, RateLimitConfig};
    /// use chrono::Duration;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let acclaim = AcclaimBuilder::new()
    ///     .with_sqlite("sqlite::memory:")
    ///     .await?
    ///     .with_rate_limit_config(
    ///         RateLimitConfig::default()
    ///             .with_max_attempts(3)
    ///             .with_lockout_duration(Duration::minutes(30)),
    ///     )
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    pub fn with_access_config(mut self, config: AccessConfig) -> Self {
        self.access_config = config;
        self
    }

    /// Recipient of member-removal and ownership requests.
    pub fn with_administrator_email(mut self, email: impl Into<String>) -> Self {
        self.access_config = self.access_config.with_administrator_email(email);
        self
    }

    /// How many notifications may wait for delivery. Beyond that new ones
    /// are dropped with a warning.
    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity;
        self
    }

    /// Set whether to apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    fn validate(&self) -> Result<(), AcclaimBuilderError> {
        if self.session_config.expires_in <= Duration::zero() {
            return Err(AcclaimBuilderError::InvalidConfiguration(
                "session expiry must be positive".to_string(),
            ));
        }

        let limits = &self.rate_limit_config;
        if limits.enabled && limits.max_attempts == 0 {
            return Err(AcclaimBuilderError::InvalidConfiguration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if limits.enabled && limits.lockout_duration <= Duration::zero() {
            return Err(AcclaimBuilderError::InvalidConfiguration(
                "lockout duration must be positive".to_string(),
            ));
        }
        if limits.sweep_interval.is_zero() {
            return Err(AcclaimBuilderError::InvalidConfiguration(
                "sweep interval must be non-zero".to_string(),
            ));
        }
        if self.notification_capacity == 0 {
            return Err(AcclaimBuilderError::InvalidConfiguration(
                "notification capacity must be at least 1".to_string(),
            ));
        }

        validate_email(&self.access_config.administrator_email)
            .map_err(|e| AcclaimBuilderError::InvalidConfiguration(e.to_string()))
    }
}

impl<R: RepositoryProvider, S: RateLimitStore> AcclaimBuilder<WithStorage<R>, S> {
    /// Build the Acclaim instance.
    ///
    /// Validates the configuration and, if `apply_migrations(true)` was
    /// called, migrates the storage before returning.
    pub async fn build(self) -> Result<Acclaim<R, S>, AcclaimBuilderError> {
        self.validate()?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| AcclaimBuilderError::Migration(e.to_string()))?;
        }

        Ok(Acclaim::from_parts(
            self.storage.repositories,
            self.rate_limit_store,
            self.session_config,
            self.rate_limit_config,
            self.access_config,
            self.notification_capacity,
        ))
    }
}
