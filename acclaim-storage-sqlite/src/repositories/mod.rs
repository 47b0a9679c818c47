//! Repository implementations for SQLite storage

pub mod audit;
pub mod login_history;
pub mod organisation;
pub mod password;
pub mod rate_limit;
pub mod restriction;
pub mod session;
pub mod user;

pub use audit::SqliteAuditRepository;
pub use login_history::SqliteLoginHistoryRepository;
pub use organisation::SqliteOrganisationRepository;
pub use password::SqlitePasswordRepository;
pub use rate_limit::SqliteRateLimitStore;
pub use restriction::SqliteRestrictionRepository;
pub use session::SqliteSessionRepository;
pub use user::SqliteUserRepository;

use acclaim_core::{
    Error,
    error::StorageError,
    repositories::{
        AuditRepositoryProvider, LoginHistoryRepositoryProvider, OrganisationRepositoryProvider,
        PasswordRepositoryProvider, RepositoryProvider, RestrictionRepositoryProvider,
        SessionRepositoryProvider, UserRepositoryProvider,
    },
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Repository provider implementation for SQLite
///
/// All repositories share one pool.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    user: Arc<SqliteUserRepository>,
    session: Arc<SqliteSessionRepository>,
    password: Arc<SqlitePasswordRepository>,
    login_history: Arc<SqliteLoginHistoryRepository>,
    audit: Arc<SqliteAuditRepository>,
    organisation: Arc<SqliteOrganisationRepository>,
    restriction: Arc<SqliteRestrictionRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            user: Arc::new(SqliteUserRepository::new(pool.clone())),
            session: Arc::new(SqliteSessionRepository::new(pool.clone())),
            password: Arc::new(SqlitePasswordRepository::new(pool.clone())),
            login_history: Arc::new(SqliteLoginHistoryRepository::new(pool.clone())),
            audit: Arc::new(SqliteAuditRepository::new(pool.clone())),
            organisation: Arc::new(SqliteOrganisationRepository::new(pool.clone())),
            restriction: Arc::new(SqliteRestrictionRepository::new(pool.clone())),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A rate-limit store on the same pool.
    pub fn rate_limit_store(&self) -> SqliteRateLimitStore {
        SqliteRateLimitStore::new(self.pool.clone())
    }
}

impl UserRepositoryProvider for SqliteRepositoryProvider {
    type UserRepo = SqliteUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl SessionRepositoryProvider for SqliteRepositoryProvider {
    type SessionRepo = SqliteSessionRepository;

    fn session(&self) -> &Self::SessionRepo {
        &self.session
    }
}

impl PasswordRepositoryProvider for SqliteRepositoryProvider {
    type PasswordRepo = SqlitePasswordRepository;

    fn password(&self) -> &Self::PasswordRepo {
        &self.password
    }
}

impl LoginHistoryRepositoryProvider for SqliteRepositoryProvider {
    type LoginHistoryRepo = SqliteLoginHistoryRepository;

    fn login_history(&self) -> &Self::LoginHistoryRepo {
        &self.login_history
    }
}

impl AuditRepositoryProvider for SqliteRepositoryProvider {
    type AuditRepo = SqliteAuditRepository;

    fn audit(&self) -> &Self::AuditRepo {
        &self.audit
    }
}

impl OrganisationRepositoryProvider for SqliteRepositoryProvider {
    type OrganisationRepo = SqliteOrganisationRepository;

    fn organisation(&self) -> &Self::OrganisationRepo {
        &self.organisation
    }
}

impl RestrictionRepositoryProvider for SqliteRepositoryProvider {
    type RestrictionRepo = SqliteRestrictionRepository;

    fn restriction(&self) -> &Self::RestrictionRepo {
        &self.restriction
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        use crate::migrations::{self, SqliteMigrationManager};
        use acclaim_migration::MigrationManager;

        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
