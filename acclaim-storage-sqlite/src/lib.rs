//! SQLite storage backend for Acclaim
//!
//! [`SqliteRepositoryProvider`] implements every repository trait from
//! `acclaim-core` over one [`sqlx::SqlitePool`]. [`SqliteRateLimitStore`]
//! keeps login rate-limit counters in the same database so that several
//! application instances share one view of lockouts.
//!
//! Timestamps are stored as unix seconds.

pub mod migrations;
pub mod repositories;

pub use repositories::{SqliteRateLimitStore, SqliteRepositoryProvider};

use acclaim_core::{Error, error::StorageError};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Open a pool for `database_url`, creating the database file if needed.
///
/// `sqlite::memory:` gets a single connection, since every connection to an
/// in-memory database sees its own empty database.
pub async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?
        .create_if_missing(true)
        .foreign_keys(true);

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite");
            Error::Storage(StorageError::Connection(e.to_string()))
        })
}

pub(crate) fn from_timestamp(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    use acclaim_core::repositories::RepositoryProvider;

    let pool = connect("sqlite::memory:").await.unwrap();
    SqliteRepositoryProvider::new(pool.clone())
        .migrate()
        .await
        .unwrap();
    pool
}
