use acclaim_core::{
    Error, error::utilities::DatabaseResultExt, repositories::LoginHistoryRepository,
    storage::LoginHistoryEntry,
};
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteLoginHistoryRepository {
    pool: SqlitePool,
}

impl SqliteLoginHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginHistoryRepository for SqliteLoginHistoryRepository {
    async fn record(&self, entry: LoginHistoryEntry) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO login_history (email, ip_address, user_agent, logged_in_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&entry.email)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.logged_in_at.timestamp())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to record login history")?;

        Ok(())
    }

    async fn is_new_location(
        &self,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<bool, Error> {
        let seen: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM login_history
                WHERE email = ?1 AND ip_address = ?2 AND user_agent = ?3
            )
            "#,
        )
        .bind(email)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await
        .map_db_err_with_context("Failed to read login history")?;

        Ok(!seen)
    }
}
