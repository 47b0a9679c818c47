//! Versioned schema migrations for Acclaim storage backends
//!
//! A backend lists its [`Migration`]s and implements [`MigrationManager`]
//! over its own connection type. Applied versions are tracked in the
//! `_acclaim_migrations` table.

use acclaim_core::{Error, error::StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<MigrationError> for Error {
    fn from(value: MigrationError) -> Self {
        Error::Storage(StorageError::Migration(value.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Apply the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Revert the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Ordering key, unique per backend
    fn version(&self) -> i64;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix seconds
    pub applied_at: i64,
}

impl MigrationRecord {
    pub fn applied_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.applied_at, 0)
    }
}

/// Check that no two migrations share a version.
pub fn check_versions<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    let mut versions: Vec<i64> = migrations.iter().map(|m| m.version()).collect();
    versions.sort_unstable();
    match versions.windows(2).find(|pair| pair[0] == pair[1]) {
        Some(pair) => Err(MigrationError::DuplicateVersion(pair[0])),
        None => Ok(()),
    }
}

/// Migrations not yet recorded as applied, in ascending version order.
pub fn pending<'m, DB: Database>(
    migrations: &'m [Box<dyn Migration<DB>>],
    applied: &[MigrationRecord],
) -> Vec<&'m dyn Migration<DB>> {
    let mut pending: Vec<&dyn Migration<DB>> = migrations
        .iter()
        .filter(|m| !applied.iter().any(|r| r.version == m.version()))
        .map(|m| &**m)
        .collect();
    pending.sort_by_key(|m| m.version());
    pending
}

/// Applied migrations to revert, newest first.
pub fn revertible<'m, DB: Database>(
    migrations: &'m [Box<dyn Migration<DB>>],
    applied: &[MigrationRecord],
) -> Vec<&'m dyn Migration<DB>> {
    let mut revertible: Vec<&dyn Migration<DB>> = migrations
        .iter()
        .filter(|m| applied.iter().any(|r| r.version == m.version()))
        .map(|m| &**m)
        .collect();
    revertible.sort_by_key(|m| std::cmp::Reverse(m.version()));
    revertible
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        "_acclaim_migrations"
    }

    /// Create the tracking table if needed
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations in version order
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Revert applied migrations, newest first
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    async fn is_applied(&self, version: i64) -> Result<bool>;
}
