use async_trait::async_trait;

use crate::{
    Error,
    storage::{AuditEvent, LoginAttemptLog, UserActivity},
};

/// Sink for login attempts, user activity and security audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync + 'static {
    async fn log_login_attempt(&self, attempt: LoginAttemptLog) -> Result<(), Error>;

    async fn log_user_activity(&self, activity: UserActivity) -> Result<(), Error>;

    async fn log_audit_event(&self, event: AuditEvent) -> Result<(), Error>;
}
