//! # Acclaim
//!
//! Authentication and case-access core for the Acclaim debt-recovery portal.
//!
//! [`Acclaim`] wires a repository provider and a login rate-limit store into
//! the services the portal needs:
//! - the authentication gate (password and federated logins, sessions)
//! - IP-based login rate limiting with lockouts
//! - new-location login notifications
//! - per-organisation case-access restrictions and the request-only
//!   membership workflows
//!
//! Notifications are queued on an outbox and delivered by a background
//! dispatcher, so a slow or failing mail transport never delays a login.
//!
//! ## Example
//!
//! ```rust,no_run
//! use acclaim::{AcclaimBuilder, LoginContext, TracingTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let acclaim = AcclaimBuilder::new()
//!         .with_sqlite("sqlite://acclaim.db")
//!         .await?
//!         .with_sqlite_rate_limits()
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let _tasks = acclaim.start_background_tasks(Arc::new(TracingTransport), shutdown_rx);
//!
//!     let context = LoginContext::new("203.0.113.7", "Mozilla/5.0");
//!     let outcome = acclaim
//!         .login_with_password("user@example.com", "secret", &context)
//!         .await?;
//!     println!("Logged in as {}", outcome.user.name);
//!     Ok(())
//! }
//! ```
use std::sync::{Arc, Mutex};

use acclaim_core::{
    inactivity::{InactivityController, InactivityHandler, SessionInvalidator},
    notification::{NotificationDispatcher, NotificationReceiver},
    repositories::{PasswordRepositoryAdapter, UserRepositoryAdapter},
    services::{LoginRateLimiter, PasswordService, UserService},
};
use async_trait::async_trait;
use chrono::Duration;
use tokio::task::JoinHandle;

mod builder;

pub use builder::{AcclaimBuilder, AcclaimBuilderError, NoStorage, WithStorage};

/// Re-export core types from acclaim_core
pub use acclaim_core::{
    AuthenticatedUser, CaseId, Error, OrganisationId, RestrictionAction, RestrictionEntry,
    RestrictionMatrix, RestrictionState, Session, SessionToken, User, UserId,
    error::{AccessError, AuthError, NotificationError},
    inactivity::{ActivityEvent, InactivityConfig, InactivityState},
    notification::{
        DEFAULT_OUTBOX_CAPACITY, Notification, NotificationOutbox, NotificationPayload,
        NotificationTransport, OrganisationRequest, TracingTransport,
    },
    organisation::{Case, MembershipRole, Organisation},
    repositories::{InMemoryRateLimitStore, RateLimitStore, RepositoryProvider},
    services::{AccessConfig, AccessRestrictionService, LoginContext, LoginOutcome, RequestKind},
    storage::{LoginAttemptRecord, NewUser, RateLimitConfig, RateLimitStats},
};

/// Re-export storage backends
#[cfg(feature = "sqlite")]
pub use acclaim_storage_sqlite::{SqliteRateLimitStore, SqliteRepositoryProvider};

type Authentication<R, S> = acclaim_core::services::AuthenticationService<R, S>;

/// Session settings.
///
/// ```rust
/// use acclaim::SessionConfig;
/// use chrono::Duration;
///
/// let config = SessionConfig::default().expires_in(Duration::hours(1));
/// assert_eq!(config.expires_in, Duration::hours(1));
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The duration until the session expires
    pub expires_in: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expires_in: Duration::hours(8),
        }
    }
}

impl SessionConfig {
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expires_in = duration;
        self
    }
}

/// Handles to the tasks started by [`Acclaim::start_background_tasks`].
pub struct BackgroundTasks {
    pub rate_limit_sweep: JoinHandle<()>,
    /// `None` when the dispatcher was already started by an earlier call
    pub notification_dispatcher: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Wait for every task to stop. Tasks stop when the shutdown signal fires.
    pub async fn join(self) {
        if let Err(e) = self.rate_limit_sweep.await {
            tracing::error!(error = %e, "Rate-limit sweep task failed");
        }
        if let Some(dispatcher) = self.notification_dispatcher {
            if let Err(e) = dispatcher.await {
                tracing::error!(error = %e, "Notification dispatcher task failed");
            }
        }
    }
}

/// The portal's authentication and access coordinator.
///
/// `R` is the repository provider; `S` is where login rate-limit counters
/// live. The in-memory store suits a single instance; use a shared store
/// such as [`SqliteRateLimitStore`] when several instances serve logins.
pub struct Acclaim<R: RepositoryProvider, S: RateLimitStore = InMemoryRateLimitStore> {
    repositories: Arc<R>,
    user_service: Arc<UserService<UserRepositoryAdapter<R>>>,
    password_service: Arc<PasswordService<PasswordRepositoryAdapter<R>>>,
    authentication: Arc<Authentication<R, S>>,
    access: Arc<AccessRestrictionService<R>>,
    rate_limiter: Arc<LoginRateLimiter<S>>,
    outbox: NotificationOutbox,
    notifications: Mutex<Option<NotificationReceiver>>,
    session_config: SessionConfig,
}

impl<R: RepositoryProvider, S: RateLimitStore> Acclaim<R, S> {
    /// Create an instance with default configuration.
    pub fn new(repositories: Arc<R>, rate_limit_store: Arc<S>) -> Self {
        Self::from_parts(
            repositories,
            rate_limit_store,
            SessionConfig::default(),
            RateLimitConfig::default(),
            AccessConfig::default(),
            DEFAULT_OUTBOX_CAPACITY,
        )
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        rate_limit_store: Arc<S>,
        session_config: SessionConfig,
        rate_limit_config: RateLimitConfig,
        access_config: AccessConfig,
        notification_capacity: usize,
    ) -> Self {
        let (outbox, receiver) = NotificationOutbox::bounded(notification_capacity);
        let rate_limiter = Arc::new(LoginRateLimiter::new(rate_limit_store, rate_limit_config));

        let authentication = Arc::new(Authentication::new(
            repositories.clone(),
            rate_limiter.clone(),
            outbox.clone(),
            session_config.expires_in,
        ));
        let access = Arc::new(AccessRestrictionService::new(
            repositories.clone(),
            outbox.clone(),
            access_config,
        ));

        Self {
            user_service: Arc::new(UserService::new(Arc::new(UserRepositoryAdapter::new(
                repositories.clone(),
            )))),
            password_service: Arc::new(PasswordService::new(Arc::new(
                PasswordRepositoryAdapter::new(repositories.clone()),
            ))),
            repositories,
            authentication,
            access,
            rate_limiter,
            outbox,
            notifications: Mutex::new(Some(receiver)),
            session_config,
        }
    }

    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// The case-access restriction engine.
    pub fn access(&self) -> &AccessRestrictionService<R> {
        &self.access
    }

    pub fn rate_limiter(&self) -> &LoginRateLimiter<S> {
        &self.rate_limiter
    }

    /// A publishing handle onto the notification outbox.
    pub fn outbox(&self) -> NotificationOutbox {
        self.outbox.clone()
    }

    /// Take the consuming end of the outbox, for applications that deliver
    /// notifications themselves instead of through
    /// [`start_background_tasks`](Self::start_background_tasks).
    pub fn take_notification_receiver(&self) -> Option<NotificationReceiver> {
        match self.notifications.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Start the rate-limit sweep and the notification dispatcher.
    ///
    /// Both tasks stop when `shutdown` changes. The dispatcher can only be
    /// started once per instance.
    pub fn start_background_tasks(
        &self,
        transport: Arc<dyn NotificationTransport>,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> BackgroundTasks {
        let rate_limit_sweep = self.rate_limiter.start_sweep_task(shutdown.clone());

        let notification_dispatcher = match self.take_notification_receiver() {
            Some(receiver) => {
                Some(NotificationDispatcher::new(receiver, transport).start(shutdown))
            }
            None => {
                tracing::warn!("Notification dispatcher already started, not starting another");
                None
            }
        };

        tracing::info!("Started background tasks");
        BackgroundTasks {
            rate_limit_sweep,
            notification_dispatcher,
        }
    }

    /// Create a user after validating email and name.
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, Error> {
        self.user_service.create_user(new_user).await
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.user_service.get_user(user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.user_service.get_user_by_email(email).await
    }

    /// Validate, hash and store a user's permanent password.
    pub async fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), Error> {
        self.password_service.set_password(user_id, password).await
    }

    /// Store a password hash carried over from another system, as is.
    pub async fn import_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.password_service
            .import_password_hash(user_id, hash)
            .await
    }

    pub async fn set_temporary_password(
        &self,
        user_id: &UserId,
        temporary_password: Option<&str>,
    ) -> Result<(), Error> {
        self.password_service
            .set_temporary_password(user_id, temporary_password)
            .await
    }

    pub async fn set_login_notifications(
        &self,
        user_id: &UserId,
        enabled: bool,
    ) -> Result<(), Error> {
        self.user_service
            .set_login_notifications(user_id, enabled)
            .await
    }

    /// Log in with email and password.
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
        context: &LoginContext,
    ) -> Result<LoginOutcome, Error> {
        self.authentication
            .login_with_password(email, password, context)
            .await
    }

    /// Log in a federated identity whose email was verified by the identity
    /// provider.
    pub async fn login_with_sso(
        &self,
        verified_email: &str,
        context: &LoginContext,
    ) -> Result<LoginOutcome, Error> {
        self.authentication
            .login_with_sso(verified_email, context)
            .await
    }

    /// End a session. Unknown tokens are not an error.
    pub async fn logout(&self, token: &SessionToken) -> Result<(), Error> {
        self.authentication.logout(token).await
    }

    /// Get a live session by its token.
    pub async fn get_session(&self, token: &SessionToken) -> Result<Session, Error> {
        self.authentication.sessions().require_session(token).await
    }

    /// Resolve a session token to its session and the sanitized identity.
    pub async fn authenticate_session(
        &self,
        token: &SessionToken,
    ) -> Result<(Session, AuthenticatedUser), Error> {
        self.authentication.authenticate_session(token).await
    }

    pub async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.authentication
            .sessions()
            .delete_user_sessions(user_id)
            .await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<(), Error> {
        self.authentication
            .sessions()
            .cleanup_expired_sessions()
            .await
    }

    /// A [`SessionInvalidator`] that logs out `token`.
    pub fn session_invalidator(&self, token: SessionToken) -> Arc<dyn SessionInvalidator> {
        Arc::new(LogoutInvalidator {
            authentication: self.authentication.clone(),
            token,
        })
    }

    /// Start an inactivity controller that logs out `token` when it expires.
    pub fn start_inactivity_controller(
        &self,
        token: SessionToken,
        config: InactivityConfig,
        handler: Arc<dyn InactivityHandler>,
    ) -> Result<InactivityController, Error> {
        InactivityController::start(config, handler, self.session_invalidator(token))
    }
}

struct LogoutInvalidator<R: RepositoryProvider, S: RateLimitStore> {
    authentication: Arc<Authentication<R, S>>,
    token: SessionToken,
}

#[async_trait]
impl<R: RepositoryProvider, S: RateLimitStore> SessionInvalidator for LogoutInvalidator<R, S> {
    async fn invalidate(&self) -> Result<(), Error> {
        self.authentication.logout(&self.token).await
    }
}
