//! Shared rate-limit counters.
//!
//! Every application instance pointing at the same database sees the same
//! lockouts, which the in-process store cannot offer.

use acclaim_core::{
    Error, error::utilities::DatabaseResultExt, repositories::RateLimitStore,
    storage::LoginAttemptRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::from_timestamp;

pub struct SqliteRateLimitStore {
    pool: SqlitePool,
}

impl SqliteRateLimitStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteAttemptRecord {
    identifier: String,
    attempts: i64,
    locked_until: Option<i64>,
    last_attempt: i64,
    associated_account: Option<String>,
}

impl From<SqliteAttemptRecord> for LoginAttemptRecord {
    fn from(row: SqliteAttemptRecord) -> Self {
        LoginAttemptRecord {
            identifier: row.identifier,
            attempts: u32::try_from(row.attempts).unwrap_or(u32::MAX),
            locked_until: row.locked_until.map(from_timestamp),
            last_attempt: from_timestamp(row.last_attempt),
            associated_account: row.associated_account,
        }
    }
}

#[async_trait]
impl RateLimitStore for SqliteRateLimitStore {
    async fn get(&self, identifier: &str) -> Result<Option<LoginAttemptRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteAttemptRecord>(
            r#"
            SELECT identifier, attempts, locked_until, last_attempt, associated_account
            FROM rate_limit_records
            WHERE identifier = ?1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to read rate limit record")?;

        Ok(row.map(Into::into))
    }

    async fn put(&self, record: LoginAttemptRecord) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO rate_limit_records (identifier, attempts, locked_until, last_attempt, associated_account)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (identifier) DO UPDATE SET
                attempts = excluded.attempts,
                locked_until = excluded.locked_until,
                last_attempt = excluded.last_attempt,
                associated_account = excluded.associated_account
            "#,
        )
        .bind(&record.identifier)
        .bind(i64::from(record.attempts))
        .bind(record.locked_until.map(|t| t.timestamp()))
        .bind(record.last_attempt.timestamp())
        .bind(&record.associated_account)
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to write rate limit record")?;

        Ok(())
    }

    async fn remove(&self, identifier: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM rate_limit_records WHERE identifier = ?1")
            .bind(identifier)
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete rate limit record")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<LoginAttemptRecord>, Error> {
        let rows = sqlx::query_as::<_, SqliteAttemptRecord>(
            r#"
            SELECT identifier, attempts, locked_until, last_attempt, associated_account
            FROM rate_limit_records
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_db_err_with_context("Failed to list rate limit records")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn remove_stale(
        &self,
        lock_ended_before: DateTime<Utc>,
        last_attempt_before: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM rate_limit_records
            WHERE (locked_until IS NULL OR locked_until < ?1)
              AND last_attempt < ?2
            "#,
        )
        .bind(lock_ended_before.timestamp())
        .bind(last_attempt_before.timestamp())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to sweep rate limit records")?;

        Ok(result.rows_affected())
    }
}
