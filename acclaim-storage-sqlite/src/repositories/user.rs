use acclaim_core::{
    Error, OrganisationId, User, UserId, error::StorageError, repositories::UserRepository,
    storage::NewUser,
};
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::from_timestamp;

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SqliteUser {
    id: String,
    name: String,
    email: String,
    organisation_id: Option<String>,
    is_admin: bool,
    must_change_password: bool,
    login_notifications_enabled: bool,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteUser> for User {
    fn from(row: SqliteUser) -> Self {
        User {
            id: UserId::new(&row.id),
            name: row.name,
            email: row.email,
            organisation_id: row.organisation_id.as_deref().map(OrganisationId::new),
            is_admin: row.is_admin,
            must_change_password: row.must_change_password,
            login_notifications_enabled: row.login_notifications_enabled,
            created_at: from_timestamp(row.created_at),
            updated_at: from_timestamp(row.updated_at),
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, organisation_id, is_admin, must_change_password, \
     login_notifications_enabled, created_at, updated_at";

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        let now = chrono::Utc::now().timestamp();

        let sqlite_user = sqlx::query_as::<_, SqliteUser>(&format!(
            r#"
            INSERT INTO users (id, name, email, organisation_id, is_admin, must_change_password,
                               login_notifications_enabled, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id.as_str())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.organisation_id.as_ref().map(|id| id.as_str()))
        .bind(user.is_admin)
        .bind(user.must_change_password)
        .bind(user.login_notifications_enabled)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Storage(StorageError::Constraint("Email already registered".to_string()))
            }
            e => Error::Storage(StorageError::Database(e.to_string())),
        })?;

        Ok(sqlite_user.into())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        let sqlite_user = sqlx::query_as::<_, SqliteUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(sqlite_user.map(|u| u.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        // email is declared COLLATE NOCASE
        let sqlite_user = sqlx::query_as::<_, SqliteUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        Ok(sqlite_user.map(|u| u.into()))
    }

    async fn set_login_notifications(&self, user_id: &UserId, enabled: bool) -> Result<(), Error> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE users SET login_notifications_enabled = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(enabled)
        .bind(now)
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;

        if result.rows_affected() == 0 {
            return Err(Error::Storage(StorageError::NotFound));
        }

        Ok(())
    }
}
