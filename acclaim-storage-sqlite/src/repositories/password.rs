use acclaim_core::{
    Error, UserId, credential::StoredCredentials, error::utilities::DatabaseResultExt,
    repositories::PasswordRepository,
};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Password material lives on the `users` row.
pub struct SqlitePasswordRepository {
    pool: SqlitePool,
}

impl SqlitePasswordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteCredentials {
    temporary_password: Option<String>,
    password_hash: Option<String>,
}

#[async_trait]
impl PasswordRepository for SqlitePasswordRepository {
    async fn get_credentials(&self, user_id: &UserId) -> Result<StoredCredentials, Error> {
        let row = sqlx::query_as::<_, SqliteCredentials>(
            "SELECT temporary_password, password_hash FROM users WHERE id = ?1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to load credentials")?;

        Ok(row
            .map(|row| StoredCredentials {
                temporary_password: row.temporary_password,
                password_hash: row.password_hash,
            })
            .unwrap_or_default())
    }

    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        sqlx::query("UPDATE users SET password_hash = ?1, updated_at = unixepoch() WHERE id = ?2")
            .bind(hash)
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to store password hash")?;

        Ok(())
    }

    async fn set_temporary_password(
        &self,
        user_id: &UserId,
        temporary_password: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(
            "UPDATE users SET temporary_password = ?1, updated_at = unixepoch() WHERE id = ?2",
        )
        .bind(temporary_password)
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to store temporary password")?;

        Ok(())
    }
}
