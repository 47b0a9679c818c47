use acclaim_core::{
    CaseId, Error, OrganisationId, UserId,
    error::utilities::DatabaseResultExt,
    organisation::{RestrictionEntry, RestrictionState},
    repositories::RestrictionRepository,
};
use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

/// Only restricted pairs are stored; allowing a pair deletes its row.
pub struct SqliteRestrictionRepository {
    pool: SqlitePool,
}

impl SqliteRestrictionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteRestriction {
    user_id: String,
    case_id: String,
}

async fn write_state(
    conn: &mut SqliteConnection,
    organisation_id: &OrganisationId,
    user_id: &UserId,
    case_id: &CaseId,
    state: RestrictionState,
) -> Result<(), sqlx::Error> {
    let query = match state {
        RestrictionState::Restricted => {
            r#"
            INSERT INTO case_access_restrictions (organisation_id, user_id, case_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT DO NOTHING
            "#
        }
        RestrictionState::Allowed => {
            r#"
            DELETE FROM case_access_restrictions
            WHERE organisation_id = ?1 AND user_id = ?2 AND case_id = ?3
            "#
        }
    };

    sqlx::query(query)
        .bind(organisation_id.as_str())
        .bind(user_id.as_str())
        .bind(case_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl RestrictionRepository for SqliteRestrictionRepository {
    async fn list_for_organisation(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<RestrictionEntry>, Error> {
        let rows = sqlx::query_as::<_, SqliteRestriction>(
            r#"
            SELECT user_id, case_id FROM case_access_restrictions
            WHERE organisation_id = ?1
            ORDER BY user_id, case_id
            "#,
        )
        .bind(organisation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_db_err_with_context("Failed to list restrictions")?;

        Ok(rows
            .into_iter()
            .map(|row| RestrictionEntry {
                user_id: UserId::new(&row.user_id),
                case_id: CaseId::new(&row.case_id),
            })
            .collect())
    }

    async fn get(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
    ) -> Result<RestrictionState, Error> {
        let restricted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM case_access_restrictions
                WHERE organisation_id = ?1 AND user_id = ?2 AND case_id = ?3
            )
            "#,
        )
        .bind(organisation_id.as_str())
        .bind(user_id.as_str())
        .bind(case_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_db_err_with_context("Failed to read restriction")?;

        Ok(RestrictionState::from_restricted(restricted))
    }

    async fn set(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
        state: RestrictionState,
    ) -> Result<(), Error> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_db_err_with_context("Failed to acquire connection")?;
        write_state(&mut conn, organisation_id, user_id, case_id, state)
            .await
            .map_db_err_with_context("Failed to write restriction")
    }

    /// All pairs are written in one transaction.
    async fn set_many(
        &self,
        organisation_id: &OrganisationId,
        entries: &[RestrictionEntry],
        state: RestrictionState,
    ) -> Result<(), Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_db_err_with_context("Failed to begin transaction")?;

        for entry in entries {
            write_state(&mut tx, organisation_id, &entry.user_id, &entry.case_id, state)
                .await
                .map_db_err_with_context("Failed to write restriction")?;
        }

        tx.commit()
            .await
            .map_db_err_with_context("Failed to commit restrictions")
    }
}
