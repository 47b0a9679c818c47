use async_trait::async_trait;

use crate::{
    Error,
    id::{CaseId, OrganisationId, UserId},
    organisation::{Case, MembershipRole, Organisation, OrganisationMember},
};

/// Repository for organisations, their memberships and their cases
#[async_trait]
pub trait OrganisationRepository: Send + Sync + 'static {
    /// Create a new organisation
    async fn create_organisation(&self, name: &str) -> Result<Organisation, Error>;

    /// Find an organisation by ID
    async fn find_organisation(&self, id: &OrganisationId) -> Result<Option<Organisation>, Error>;

    /// Add a user to an organisation, or change their role if already a member
    async fn upsert_member(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        role: MembershipRole,
    ) -> Result<(), Error>;

    /// A single membership, if the user belongs to the organisation
    async fn find_member(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
    ) -> Result<Option<OrganisationMember>, Error>;

    /// All current members of an organisation
    async fn list_members(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<OrganisationMember>, Error>;

    /// Organisations in which the user holds the owner role
    async fn owned_organisations(&self, user_id: &UserId) -> Result<Vec<OrganisationId>, Error>;

    /// Create a case in an organisation
    async fn create_case(
        &self,
        organisation_id: &OrganisationId,
        reference: &str,
    ) -> Result<Case, Error>;

    /// Find a case by ID
    async fn find_case(&self, id: &CaseId) -> Result<Option<Case>, Error>;

    /// All cases currently in an organisation, oldest first
    async fn list_cases(&self, organisation_id: &OrganisationId) -> Result<Vec<Case>, Error>;
}
