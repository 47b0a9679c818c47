use acclaim_core::{
    CaseId, Error, OrganisationId, UserId,
    error::StorageError,
    organisation::{Case, MembershipRole, Organisation, OrganisationMember},
    repositories::OrganisationRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::from_timestamp;

pub struct SqliteOrganisationRepository {
    pool: SqlitePool,
}

impl SqliteOrganisationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteOrganisation {
    id: String,
    name: String,
    created_at: i64,
}

impl From<SqliteOrganisation> for Organisation {
    fn from(row: SqliteOrganisation) -> Self {
        Organisation {
            id: OrganisationId::new(&row.id),
            name: row.name,
            created_at: from_timestamp(row.created_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteCase {
    id: String,
    organisation_id: String,
    reference: String,
    created_at: i64,
}

impl From<SqliteCase> for Case {
    fn from(row: SqliteCase) -> Self {
        Case {
            id: CaseId::new(&row.id),
            organisation_id: OrganisationId::new(&row.organisation_id),
            reference: row.reference,
            created_at: from_timestamp(row.created_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteMember {
    user_id: String,
    name: String,
    email: String,
    is_admin: bool,
    role: String,
}

impl TryFrom<SqliteMember> for OrganisationMember {
    type Error = Error;

    fn try_from(row: SqliteMember) -> Result<Self, Self::Error> {
        Ok(OrganisationMember {
            user_id: UserId::new(&row.user_id),
            name: row.name,
            email: row.email,
            is_admin: row.is_admin,
            role: row.role.parse::<MembershipRole>()?,
        })
    }
}

const MEMBER_QUERY: &str = r#"
    SELECT m.user_id, u.name, u.email, u.is_admin, m.role
    FROM organisation_members m
    JOIN users u ON u.id = m.user_id
    WHERE m.organisation_id = ?1
"#;

fn db_error(e: sqlx::Error) -> Error {
    Error::Storage(StorageError::Database(e.to_string()))
}

#[async_trait]
impl OrganisationRepository for SqliteOrganisationRepository {
    async fn create_organisation(&self, name: &str) -> Result<Organisation, Error> {
        let row = sqlx::query_as::<_, SqliteOrganisation>(
            r#"
            INSERT INTO organisations (id, name, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, created_at
            "#,
        )
        .bind(OrganisationId::new_random().as_str())
        .bind(name)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn find_organisation(&self, id: &OrganisationId) -> Result<Option<Organisation>, Error> {
        let row = sqlx::query_as::<_, SqliteOrganisation>(
            "SELECT id, name, created_at FROM organisations WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(Into::into))
    }

    async fn upsert_member(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        role: MembershipRole,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO organisation_members (organisation_id, user_id, role)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (organisation_id, user_id) DO UPDATE SET role = excluded.role
            "#,
        )
        .bind(organisation_id.as_str())
        .bind(user_id.as_str())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_member(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
    ) -> Result<Option<OrganisationMember>, Error> {
        let row = sqlx::query_as::<_, SqliteMember>(&format!("{MEMBER_QUERY} AND m.user_id = ?2"))
            .bind(organisation_id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(OrganisationMember::try_from).transpose()
    }

    async fn list_members(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<OrganisationMember>, Error> {
        sqlx::query_as::<_, SqliteMember>(&format!("{MEMBER_QUERY} ORDER BY u.name"))
            .bind(organisation_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(OrganisationMember::try_from)
            .collect()
    }

    async fn owned_organisations(&self, user_id: &UserId) -> Result<Vec<OrganisationId>, Error> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT organisation_id FROM organisation_members
            WHERE user_id = ?1 AND role = 'owner'
            ORDER BY organisation_id
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(ids.into_iter().map(OrganisationId::from).collect())
    }

    async fn create_case(
        &self,
        organisation_id: &OrganisationId,
        reference: &str,
    ) -> Result<Case, Error> {
        let row = sqlx::query_as::<_, SqliteCase>(
            r#"
            INSERT INTO cases (id, organisation_id, reference, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, organisation_id, reference, created_at
            "#,
        )
        .bind(CaseId::new_random().as_str())
        .bind(organisation_id.as_str())
        .bind(reference)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.into())
    }

    async fn find_case(&self, id: &CaseId) -> Result<Option<Case>, Error> {
        let row = sqlx::query_as::<_, SqliteCase>(
            "SELECT id, organisation_id, reference, created_at FROM cases WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(Into::into))
    }

    async fn list_cases(&self, organisation_id: &OrganisationId) -> Result<Vec<Case>, Error> {
        let rows = sqlx::query_as::<_, SqliteCase>(
            r#"
            SELECT id, organisation_id, reference, created_at FROM cases
            WHERE organisation_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(organisation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
