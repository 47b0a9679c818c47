//! The authentication gate.
//!
//! Every login, whether by password or by a federated identity that has
//! already been verified upstream, goes through [`AuthenticationService`]:
//!
//! 1. lock check against the source IP (no credential work while locked)
//! 2. case-insensitive account lookup and credential verification
//! 3. on failure: count the attempt, audit it, audit a fresh lockout
//! 4. on success: reset the counter, audit, log activity, maybe notify
//! 5. create a session and return the sanitized identity
//!
//! Audit and history writes are side effects of a login, not part of its
//! outcome; a failing write is logged and the login result stands.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    Error, Session, User,
    credential::verify_unknown_account,
    error::{AuthError, SessionError},
    notification::{LoginMethod, Notification, NotificationOutbox, NotificationPayload},
    repositories::{
        AuditRepository, LoginHistoryRepositoryAdapter, OrganisationRepository,
        PasswordRepository, RateLimitStore, RepositoryProvider, SessionRepositoryAdapter,
        UserRepository,
    },
    services::{LoginLocationService, LoginRateLimiter, SessionService},
    session::SessionToken,
    storage::{AuditEvent, LoginAttemptLog, UserActivity},
    user::AuthenticatedUser,
};

/// Where a login attempt came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginContext {
    pub ip_address: String,
    pub user_agent: String,
}

impl LoginContext {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: AuthenticatedUser,
    pub session: Session,
}

pub struct AuthenticationService<R: RepositoryProvider, S: RateLimitStore> {
    repositories: Arc<R>,
    rate_limiter: Arc<LoginRateLimiter<S>>,
    sessions: SessionService<SessionRepositoryAdapter<R>>,
    locations: LoginLocationService<LoginHistoryRepositoryAdapter<R>>,
    outbox: NotificationOutbox,
    session_duration: Duration,
}

impl<R, S> AuthenticationService<R, S>
where
    R: RepositoryProvider,
    S: RateLimitStore,
{
    pub fn new(
        repositories: Arc<R>,
        rate_limiter: Arc<LoginRateLimiter<S>>,
        outbox: NotificationOutbox,
        session_duration: Duration,
    ) -> Self {
        let sessions = SessionService::new(Arc::new(SessionRepositoryAdapter::new(
            repositories.clone(),
        )));
        let locations = LoginLocationService::new(Arc::new(LoginHistoryRepositoryAdapter::new(
            repositories.clone(),
        )));
        Self {
            repositories,
            rate_limiter,
            sessions,
            locations,
            outbox,
            session_duration,
        }
    }

    pub fn sessions(&self) -> &SessionService<SessionRepositoryAdapter<R>> {
        &self.sessions
    }

    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RateLimited`] if the source is locked, including when
    ///   this very attempt triggered the lock
    /// - [`AuthError::InvalidCredentials`] for an unknown account or a wrong
    ///   password, with the attempts left before a lock
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
        context: &LoginContext,
    ) -> Result<LoginOutcome, Error> {
        self.ensure_not_locked(email, context).await?;

        let email = email.trim();
        let Some(user) = self.repositories.user().find_by_email(email).await? else {
            // same hashing cost as a wrong password
            verify_unknown_account(password);
            return Err(self.reject(email, context, "unknown account").await);
        };

        let credentials = self.repositories.password().get_credentials(&user.id).await?;
        match credentials.verify(password) {
            Some(credential) => {
                tracing::debug!(
                    user_id = %user.id,
                    credential = credential.kind(),
                    "Password credential accepted"
                );
                self.complete_login(user, context, LoginMethod::Password)
                    .await
            }
            None => Err(self.reject(email, context, "invalid password").await),
        }
    }

    /// Complete a login for an identity already verified by the SSO provider.
    ///
    /// No credential comparison happens here. An email with no matching
    /// account fails like a wrong password and counts against the source.
    pub async fn login_with_sso(
        &self,
        verified_email: &str,
        context: &LoginContext,
    ) -> Result<LoginOutcome, Error> {
        self.ensure_not_locked(verified_email, context).await?;

        let email = verified_email.trim();
        match self.repositories.user().find_by_email(email).await? {
            Some(user) => self.complete_login(user, context, LoginMethod::AzureSso).await,
            None => Err(self.reject(email, context, "unknown federated account").await),
        }
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &SessionToken) -> Result<(), Error> {
        if let Some(session) = self.sessions.get_session(token).await? {
            self.log_activity(&session_user_activity(&session, "LOGOUT"))
                .await;
        }
        self.sessions.delete_session(token).await
    }

    /// Resolve a session token to the identity payload.
    pub async fn authenticate_session(
        &self,
        token: &SessionToken,
    ) -> Result<(Session, AuthenticatedUser), Error> {
        let session = self.sessions.require_session(token).await?;
        let user = self
            .repositories
            .user()
            .find_by_id(&session.user_id)
            .await?
            .ok_or(SessionError::NotFound)?;
        let identity = self.identity_for(&user).await?;
        Ok((session, identity))
    }

    pub async fn identity_for(&self, user: &User) -> Result<AuthenticatedUser, Error> {
        let owned = self
            .repositories
            .organisation()
            .owned_organisations(&user.id)
            .await?;
        Ok(user.to_authenticated(owned))
    }

    async fn ensure_not_locked(&self, email: &str, context: &LoginContext) -> Result<(), Error> {
        let status = self.rate_limiter.is_locked(&context.ip_address).await?;
        if !status.locked {
            return Ok(());
        }

        tracing::warn!(
            ip = %context.ip_address,
            email = %email,
            remaining_seconds = status.remaining_seconds,
            "Login refused for locked source"
        );
        self.log_attempt(email, false, context, Some("rate limited"))
            .await;

        Err(AuthError::RateLimited {
            retry_after_seconds: status.remaining_seconds.unwrap_or(0),
        }
        .into())
    }

    /// Record a failed attempt and build the error returned to the caller.
    async fn reject(&self, email: &str, context: &LoginContext, reason: &str) -> Error {
        let outcome = match self
            .rate_limiter
            .record_failed_attempt(&context.ip_address, Some(email))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return e,
        };

        self.log_attempt(email, false, context, Some(reason)).await;

        if outcome.newly_locked {
            let event = AuditEvent {
                table_name: "login_attempts".to_string(),
                record_id: context.ip_address.clone(),
                operation: "LOCKOUT".to_string(),
                description: format!(
                    "IP {} locked out after {} failed login attempts (last attempted email: {})",
                    context.ip_address,
                    self.rate_limiter.config().max_attempts,
                    email
                ),
                user_id: None,
                ip_address: Some(context.ip_address.clone()),
            };
            if let Err(e) = self.repositories.audit().log_audit_event(event).await {
                tracing::error!(error = %e, ip = %context.ip_address, "Failed to write lockout audit event");
            }
        }

        if outcome.locked {
            AuthError::RateLimited {
                retry_after_seconds: outcome.remaining_seconds.unwrap_or(0),
            }
            .into()
        } else {
            AuthError::InvalidCredentials {
                attempts_remaining: Some(outcome.attempts_remaining),
            }
            .into()
        }
    }

    async fn complete_login(
        &self,
        user: User,
        context: &LoginContext,
        method: LoginMethod,
    ) -> Result<LoginOutcome, Error> {
        self.rate_limiter
            .record_successful_login(&context.ip_address)
            .await?;

        self.log_attempt(&user.email, true, context, None).await;
        self.log_activity(&UserActivity {
            user_id: user.id.clone(),
            action: "LOGIN".to_string(),
            details: format!("Logged in via {}", method.as_str()),
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
        })
        .await;

        if user.login_notifications_enabled {
            self.notify_if_new_location(&user, context, method).await;
        }

        if let Err(e) = self
            .locations
            .record_login(&user.email, &context.ip_address, &context.user_agent)
            .await
        {
            tracing::error!(error = %e, user_id = %user.id, "Failed to record login history");
        }

        let session = self
            .sessions
            .create_session(
                &user.id,
                Some(context.user_agent.clone()),
                Some(context.ip_address.clone()),
                self.session_duration,
            )
            .await?;

        let identity = self.identity_for(&user).await?;

        tracing::info!(user_id = %user.id, method = method.as_str(), "User logged in");

        Ok(LoginOutcome {
            user: identity,
            session,
        })
    }

    async fn notify_if_new_location(&self, user: &User, context: &LoginContext, method: LoginMethod) {
        match self
            .locations
            .is_new_location(&user.email, &context.ip_address, &context.user_agent)
            .await
        {
            Ok(true) => self.outbox.publish(Notification {
                recipient: user.email.clone(),
                payload: NotificationPayload::LoginNotification {
                    user_name: user.name.clone(),
                    method,
                    ip_address: context.ip_address.clone(),
                    user_agent: context.user_agent.clone(),
                    occurred_at: Utc::now(),
                },
            }),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user.id, "New-location check failed, skipping notification");
            }
        }
    }

    async fn log_attempt(
        &self,
        email: &str,
        success: bool,
        context: &LoginContext,
        failure_reason: Option<&str>,
    ) {
        let attempt = LoginAttemptLog {
            email: email.to_string(),
            success,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            failure_reason: failure_reason.map(str::to_string),
        };
        if let Err(e) = self.repositories.audit().log_login_attempt(attempt).await {
            tracing::error!(error = %e, "Failed to write login attempt audit row");
        }
    }

    async fn log_activity(&self, activity: &UserActivity) {
        if let Err(e) = self
            .repositories
            .audit()
            .log_user_activity(activity.clone())
            .await
        {
            tracing::error!(error = %e, user_id = %activity.user_id, "Failed to write activity row");
        }
    }
}

fn session_user_activity(session: &Session, action: &str) -> UserActivity {
    UserActivity {
        user_id: session.user_id.clone(),
        action: action.to_string(),
        details: String::new(),
        ip_address: session.ip_address.clone().unwrap_or_default(),
        user_agent: session.user_agent.clone().unwrap_or_default(),
    }
}
