use acclaim_core::{
    Error,
    error::StorageError,
    repositories::AuditRepository,
    storage::{AuditEvent, LoginAttemptLog, UserActivity},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn log_login_attempt(&self, attempt: LoginAttemptLog) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (email, success, ip_address, user_agent, failure_reason, attempted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&attempt.email)
        .bind(attempt.success)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(&attempt.failure_reason)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        Ok(())
    }

    async fn log_user_activity(&self, activity: UserActivity) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO user_activity (user_id, action, details, ip_address, user_agent, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(activity.user_id.as_str())
        .bind(&activity.action)
        .bind(&activity.details)
        .bind(&activity.ip_address)
        .bind(&activity.user_agent)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record user activity");
            StorageError::Database("Failed to record user activity".to_string())
        })?;

        Ok(())
    }

    async fn log_audit_event(&self, event: AuditEvent) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (table_name, record_id, operation, description, user_id, ip_address, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&event.table_name)
        .bind(&event.record_id)
        .bind(&event.operation)
        .bind(&event.description)
        .bind(event.user_id.as_ref().map(|id| id.as_str()))
        .bind(&event.ip_address)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record audit event");
            StorageError::Database("Failed to record audit event".to_string())
        })?;

        Ok(())
    }
}
