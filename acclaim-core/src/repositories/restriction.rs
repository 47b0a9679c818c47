use async_trait::async_trait;

use crate::{
    Error,
    id::{CaseId, OrganisationId, UserId},
    organisation::{RestrictionEntry, RestrictionState},
};

/// Repository for the sparse (organisation, user, case) restriction relation.
///
/// Only restricted pairs are stored. Setting a pair to allowed removes it.
#[async_trait]
pub trait RestrictionRepository: Send + Sync + 'static {
    /// Every stored restricted pair for an organisation, orphans included
    async fn list_for_organisation(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<RestrictionEntry>, Error>;

    /// Current state of one pair. Absence means [`RestrictionState::Allowed`].
    async fn get(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
    ) -> Result<RestrictionState, Error>;

    /// Set the state of one pair
    async fn set(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
        state: RestrictionState,
    ) -> Result<(), Error>;

    /// Set the same state on many pairs
    ///
    /// Backends that can batch writes should override this.
    async fn set_many(
        &self,
        organisation_id: &OrganisationId,
        entries: &[RestrictionEntry],
        state: RestrictionState,
    ) -> Result<(), Error> {
        for entry in entries {
            self.set(organisation_id, &entry.user_id, &entry.case_id, state)
                .await?;
        }
        Ok(())
    }
}
