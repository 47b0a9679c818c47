use acclaim_migration::{Migration, MigrationError, MigrationManager, MigrationRecord};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Database, Sqlite, SqlitePool};

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationManager<Sqlite> for SqliteMigrationManager {
    async fn initialize(&self) -> Result<(), MigrationError> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn up(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        acclaim_migration::check_versions(migrations)?;
        let applied = self.get_applied_migrations().await?;

        for migration in acclaim_migration::pending(migrations, &applied) {
            let mut tx = self.pool.begin().await?;

            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Applying migration"
            );

            migration
                .up(&mut *tx as &mut <Sqlite as Database>::Connection)
                .await?;

            sqlx::query(
                format!(
                    "INSERT INTO {} (version, name, applied_at) VALUES (?, ?, ?)",
                    self.get_migration_table_name()
                )
                .as_str(),
            )
            .bind(migration.version())
            .bind(migration.name())
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }
        Ok(())
    }

    async fn down(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        let applied = self.get_applied_migrations().await?;

        for migration in acclaim_migration::revertible(migrations, &applied) {
            let mut tx = self.pool.begin().await?;

            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Reverting migration"
            );

            migration
                .down(&mut *tx as &mut <Sqlite as Database>::Connection)
                .await?;

            sqlx::query(
                format!(
                    "DELETE FROM {} WHERE version = ?",
                    self.get_migration_table_name()
                )
                .as_str(),
            )
            .bind(migration.version())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }
        Ok(())
    }

    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let records = sqlx::query_as::<_, MigrationRecord>(
            format!(
                "SELECT version, name, applied_at FROM {} ORDER BY version",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn is_applied(&self, version: i64) -> Result<bool, MigrationError> {
        let result: bool = sqlx::query_scalar(
            format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE version = ?)",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(result)
    }
}

/// Every migration for this backend, oldest first.
pub fn all() -> Vec<Box<dyn Migration<Sqlite>>> {
    vec![
        Box::new(CreateUsersTable),
        Box::new(CreateSessionsTable),
        Box::new(CreateOrganisationTables),
        Box::new(CreateCaseAccessRestrictionsTable),
        Box::new(CreateLoginHistoryTable),
        Box::new(CreateAuditTables),
        Box::new(CreateRateLimitTable),
    ]
}

/// Runs each statement in order. Statements are separated so a single
/// `execute` never carries more than one.
async fn execute_all(
    conn: &mut <Sqlite as Database>::Connection,
    statements: &[&str],
) -> Result<(), MigrationError> {
    for statement in statements {
        sqlx::query(statement).execute(&mut *conn).await?;
    }
    Ok(())
}

pub struct CreateUsersTable;

#[async_trait]
impl Migration<Sqlite> for CreateUsersTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "CreateUsersTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL COLLATE NOCASE,
                organisation_id TEXT,
                is_admin INTEGER NOT NULL DEFAULT 0,
                must_change_password INTEGER NOT NULL DEFAULT 0,
                login_notifications_enabled INTEGER NOT NULL DEFAULT 1,
                temporary_password TEXT,
                password_hash TEXT,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                updated_at INTEGER NOT NULL DEFAULT (unixepoch()),
                UNIQUE(email)
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct CreateSessionsTable;

#[async_trait]
impl Migration<Sqlite> for CreateSessionsTable {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "CreateSessionsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        execute_all(
            conn,
            &[
                r#"
                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    user_agent TEXT,
                    ip_address TEXT,
                    created_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL,
                    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
                );"#,
                "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);",
                "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);",
            ],
        )
        .await
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS sessions")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct CreateOrganisationTables;

#[async_trait]
impl Migration<Sqlite> for CreateOrganisationTables {
    fn version(&self) -> i64 {
        3
    }

    fn name(&self) -> &str {
        "CreateOrganisationTables"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        execute_all(
            conn,
            &[
                r#"
                CREATE TABLE IF NOT EXISTS organisations (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    created_at INTEGER NOT NULL DEFAULT (unixepoch())
                );"#,
                r#"
                CREATE TABLE IF NOT EXISTS organisation_members (
                    organisation_id TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    role TEXT NOT NULL CHECK (role IN ('member', 'owner')),
                    created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                    PRIMARY KEY (organisation_id, user_id),
                    FOREIGN KEY (organisation_id) REFERENCES organisations(id) ON DELETE CASCADE,
                    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
                );"#,
                "CREATE INDEX IF NOT EXISTS idx_organisation_members_user ON organisation_members(user_id);",
                r#"
                CREATE TABLE IF NOT EXISTS cases (
                    id TEXT PRIMARY KEY,
                    organisation_id TEXT NOT NULL,
                    reference TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (organisation_id) REFERENCES organisations(id) ON DELETE CASCADE
                );"#,
                "CREATE INDEX IF NOT EXISTS idx_cases_organisation ON cases(organisation_id);",
            ],
        )
        .await
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        execute_all(
            conn,
            &[
                "DROP TABLE IF EXISTS cases",
                "DROP TABLE IF EXISTS organisation_members",
                "DROP TABLE IF EXISTS organisations",
            ],
        )
        .await
    }
}

/// Restriction rows carry no foreign keys. A row whose member or case has
/// gone is ignored by readers rather than cascaded away.
pub struct CreateCaseAccessRestrictionsTable;

#[async_trait]
impl Migration<Sqlite> for CreateCaseAccessRestrictionsTable {
    fn version(&self) -> i64 {
        4
    }

    fn name(&self) -> &str {
        "CreateCaseAccessRestrictionsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS case_access_restrictions (
                organisation_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                case_id TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                PRIMARY KEY (organisation_id, user_id, case_id)
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS case_access_restrictions")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct CreateLoginHistoryTable;

#[async_trait]
impl Migration<Sqlite> for CreateLoginHistoryTable {
    fn version(&self) -> i64 {
        5
    }

    fn name(&self) -> &str {
        "CreateLoginHistoryTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        execute_all(
            conn,
            &[
                r#"
                CREATE TABLE IF NOT EXISTS login_history (
                    id INTEGER PRIMARY KEY,
                    email TEXT NOT NULL COLLATE NOCASE,
                    ip_address TEXT NOT NULL,
                    user_agent TEXT NOT NULL,
                    logged_in_at INTEGER NOT NULL
                );"#,
                "CREATE INDEX IF NOT EXISTS idx_login_history_location ON login_history(email, ip_address, user_agent);",
            ],
        )
        .await
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS login_history")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct CreateAuditTables;

#[async_trait]
impl Migration<Sqlite> for CreateAuditTables {
    fn version(&self) -> i64 {
        6
    }

    fn name(&self) -> &str {
        "CreateAuditTables"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        execute_all(
            conn,
            &[
                r#"
                CREATE TABLE IF NOT EXISTS login_attempts (
                    id INTEGER PRIMARY KEY,
                    email TEXT NOT NULL,
                    success INTEGER NOT NULL,
                    ip_address TEXT NOT NULL,
                    user_agent TEXT NOT NULL,
                    failure_reason TEXT,
                    attempted_at INTEGER NOT NULL
                );"#,
                r#"
                CREATE TABLE IF NOT EXISTS user_activity (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    details TEXT NOT NULL,
                    ip_address TEXT NOT NULL,
                    user_agent TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );"#,
                r#"
                CREATE TABLE IF NOT EXISTS audit_log (
                    id INTEGER PRIMARY KEY,
                    table_name TEXT NOT NULL,
                    record_id TEXT NOT NULL,
                    operation TEXT NOT NULL,
                    description TEXT NOT NULL,
                    user_id TEXT,
                    ip_address TEXT,
                    created_at INTEGER NOT NULL
                );"#,
            ],
        )
        .await
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        execute_all(
            conn,
            &[
                "DROP TABLE IF EXISTS audit_log",
                "DROP TABLE IF EXISTS user_activity",
                "DROP TABLE IF EXISTS login_attempts",
            ],
        )
        .await
    }
}

pub struct CreateRateLimitTable;

#[async_trait]
impl Migration<Sqlite> for CreateRateLimitTable {
    fn version(&self) -> i64 {
        7
    }

    fn name(&self) -> &str {
        "CreateRateLimitTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rate_limit_records (
                identifier TEXT PRIMARY KEY,
                attempts INTEGER NOT NULL,
                locked_until INTEGER,
                last_attempt INTEGER NOT NULL,
                associated_account TEXT
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS rate_limit_records")
            .execute(conn)
            .await?;
        Ok(())
    }
}
