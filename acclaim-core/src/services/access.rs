//! Organisation access-restriction engine
//!
//! Owners of an organisation decide which of its plain members may see which
//! of its cases. Every mutation checks, in order: the organisation exists,
//! the actor holds the owner role in it, the target belongs to it. The first
//! failing check decides the error, so a non-owner never learns whether a
//! given member or case id exists.
//!
//! Membership changes are never applied here. Removal and delegation are
//! requests routed to the platform administrator through the notification
//! outbox.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::{AccessError, ValidationError, utilities::NotFoundExt},
    id::{CaseId, OrganisationId, UserId},
    notification::{Notification, NotificationOutbox, NotificationPayload, OrganisationRequest},
    organisation::{
        Case, MembershipRole, Organisation, OrganisationMember, RestrictableMember,
        RestrictionAction, RestrictionEntry, RestrictionMatrix, RestrictionState,
    },
    repositories::{
        OrganisationRepository, RepositoryProvider, RestrictionRepository, UserRepository,
    },
    validation::normalize_reason,
};

/// Configuration for the access-restriction engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Recipient of member-removal and ownership requests
    pub administrator_email: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            administrator_email: "admin@acclaim.local".to_string(),
        }
    }
}

impl AccessConfig {
    pub fn with_administrator_email(mut self, email: impl Into<String>) -> Self {
        self.administrator_email = email.into();
        self
    }
}

/// The three request-only workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    MemberRemoval,
    OwnerDelegation,
    OwnershipRemoval,
}

impl RequestKind {
    fn payload(self, request: OrganisationRequest) -> NotificationPayload {
        match self {
            RequestKind::MemberRemoval => NotificationPayload::MemberRemovalRequest(request),
            RequestKind::OwnerDelegation => NotificationPayload::OwnerDelegationRequest(request),
            RequestKind::OwnershipRemoval => NotificationPayload::OwnershipRemovalRequest(request),
        }
    }

    fn check_target(self, actor: &UserId, target: &OrganisationMember) -> Result<(), Error> {
        match self {
            RequestKind::MemberRemoval if &target.user_id == actor => Err(
                ValidationError::InvalidField("Cannot request your own removal".to_string()).into(),
            ),
            RequestKind::OwnerDelegation if target.role == MembershipRole::Owner => Err(
                ValidationError::InvalidField("Target is already an owner".to_string()).into(),
            ),
            RequestKind::OwnershipRemoval if target.role != MembershipRole::Owner => Err(
                ValidationError::InvalidField("Target is not an owner".to_string()).into(),
            ),
            _ => Ok(()),
        }
    }
}

pub struct AccessRestrictionService<R: RepositoryProvider> {
    repositories: Arc<R>,
    outbox: NotificationOutbox,
    config: AccessConfig,
}

impl<R: RepositoryProvider> AccessRestrictionService<R> {
    pub fn new(repositories: Arc<R>, outbox: NotificationOutbox, config: AccessConfig) -> Self {
        Self {
            repositories,
            outbox,
            config,
        }
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Flip the restriction state of one (member, case) pair.
    ///
    /// Returns the new state.
    pub async fn toggle_restriction(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
    ) -> Result<RestrictionState, Error> {
        self.require_organisation(organisation_id).await?;
        self.require_owner(actor, organisation_id).await?;
        self.require_restrictable_member(organisation_id, user_id)
            .await?;
        self.require_case(organisation_id, case_id).await?;

        let restriction = self.repositories.restriction();
        let state = restriction
            .get(organisation_id, user_id, case_id)
            .await?
            .toggled();
        restriction
            .set(organisation_id, user_id, case_id, state)
            .await?;

        tracing::info!(
            organisation_id = %organisation_id,
            actor = %actor,
            user_id = %user_id,
            case_id = %case_id,
            restricted = state.is_restricted(),
            "Restriction toggled"
        );

        Ok(state)
    }

    /// Apply `action` to one member across every case currently in the
    /// organisation. Cases created later start allowed.
    ///
    /// Returns the number of pairs written.
    pub async fn bulk_member_restriction(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        action: RestrictionAction,
    ) -> Result<usize, Error> {
        self.require_organisation(organisation_id).await?;
        self.require_owner(actor, organisation_id).await?;
        self.require_restrictable_member(organisation_id, user_id)
            .await?;

        let entries: Vec<RestrictionEntry> = self
            .repositories
            .organisation()
            .list_cases(organisation_id)
            .await?
            .into_iter()
            .map(|case| RestrictionEntry {
                user_id: user_id.clone(),
                case_id: case.id,
            })
            .collect();

        self.repositories
            .restriction()
            .set_many(organisation_id, &entries, action.target_state())
            .await?;

        tracing::info!(
            organisation_id = %organisation_id,
            actor = %actor,
            user_id = %user_id,
            action = ?action,
            cases = entries.len(),
            "Bulk member restriction applied"
        );

        Ok(entries.len())
    }

    /// Apply `action` to one case for every restrictable member.
    ///
    /// Returns the number of pairs written.
    pub async fn bulk_case_restriction(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
        case_id: &CaseId,
        action: RestrictionAction,
    ) -> Result<usize, Error> {
        self.require_organisation(organisation_id).await?;
        self.require_owner(actor, organisation_id).await?;
        self.require_case(organisation_id, case_id).await?;

        let entries: Vec<RestrictionEntry> = self
            .restrictable_members(organisation_id)
            .await?
            .into_iter()
            .map(|member| RestrictionEntry {
                user_id: member.user_id,
                case_id: case_id.clone(),
            })
            .collect();

        self.repositories
            .restriction()
            .set_many(organisation_id, &entries, action.target_state())
            .await?;

        tracing::info!(
            organisation_id = %organisation_id,
            actor = %actor,
            case_id = %case_id,
            action = ?action,
            members = entries.len(),
            "Bulk case restriction applied"
        );

        Ok(entries.len())
    }

    /// Restricted pairs for an organisation. Pairs whose member or case is
    /// gone are left out.
    ///
    /// Only members of the organisation and platform administrators may read
    /// them. Anyone else gets [`AccessError::NotFound`], as if the
    /// organisation did not exist.
    pub async fn get_restrictions(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<RestrictionEntry>, Error> {
        self.require_organisation(organisation_id).await?;
        self.require_member_or_admin(actor, organisation_id).await?;
        Ok(self.build_matrix(organisation_id).await?.restricted_pairs())
    }

    /// Owner view: restrictable members, cases and restricted pairs.
    pub async fn restriction_matrix(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
    ) -> Result<RestrictionMatrix, Error> {
        self.require_organisation(organisation_id).await?;
        self.require_owner(actor, organisation_id).await?;
        self.build_matrix(organisation_id).await
    }

    /// Cases of the organisation that `user_id` may see.
    ///
    /// Platform administrators see every case. Users outside the
    /// organisation see none.
    pub async fn visible_cases(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
    ) -> Result<Vec<Case>, Error> {
        let organisations = self.repositories.organisation();
        let cases = organisations.list_cases(organisation_id).await?;

        let is_admin = self
            .repositories
            .user()
            .find_by_id(user_id)
            .await?
            .is_some_and(|u| u.is_admin);
        if is_admin {
            return Ok(cases);
        }

        let Some(member) = organisations.find_member(organisation_id, user_id).await? else {
            return Ok(Vec::new());
        };
        if !member.is_restrictable() {
            return Ok(cases);
        }

        let restricted: Vec<RestrictionEntry> = self
            .repositories
            .restriction()
            .list_for_organisation(organisation_id)
            .await?;

        Ok(cases
            .into_iter()
            .filter(|case| {
                !restricted
                    .iter()
                    .any(|e| &e.user_id == user_id && e.case_id == case.id)
            })
            .collect())
    }

    pub async fn is_case_visible(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
    ) -> Result<bool, Error> {
        Ok(self
            .visible_cases(organisation_id, user_id)
            .await?
            .iter()
            .any(|c| &c.id == case_id))
    }

    /// Ask the administrator to remove a member from the organisation.
    pub async fn request_member_removal(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
        target: &UserId,
        reason: Option<&str>,
    ) -> Result<OrganisationRequest, Error> {
        self.submit_request(RequestKind::MemberRemoval, actor, organisation_id, target, reason)
            .await
    }

    /// Ask the administrator to make a member an owner.
    pub async fn request_owner_delegation(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
        target: &UserId,
        reason: Option<&str>,
    ) -> Result<OrganisationRequest, Error> {
        self.submit_request(
            RequestKind::OwnerDelegation,
            actor,
            organisation_id,
            target,
            reason,
        )
        .await
    }

    /// Ask the administrator to take the owner role away from an owner.
    pub async fn request_ownership_removal(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
        target: &UserId,
        reason: Option<&str>,
    ) -> Result<OrganisationRequest, Error> {
        self.submit_request(
            RequestKind::OwnershipRemoval,
            actor,
            organisation_id,
            target,
            reason,
        )
        .await
    }

    /// Validate a request and publish it to the administrator. Nothing in
    /// storage changes.
    pub async fn submit_request(
        &self,
        kind: RequestKind,
        actor: &UserId,
        organisation_id: &OrganisationId,
        target: &UserId,
        reason: Option<&str>,
    ) -> Result<OrganisationRequest, Error> {
        let organisation = self.require_organisation(organisation_id).await?;
        let requester = self.require_owner(actor, organisation_id).await?;
        let target = self
            .repositories
            .organisation()
            .find_member(organisation_id, target)
            .await?
            .or_not_found("Member")?;
        kind.check_target(actor, &target)?;
        let reason = normalize_reason(reason)?;

        let request = OrganisationRequest {
            organisation_id: organisation.id,
            organisation_name: organisation.name,
            requester_id: requester.user_id,
            requester_name: requester.name,
            requester_email: requester.email,
            target_id: target.user_id,
            target_name: target.name,
            target_email: target.email,
            reason,
            requested_at: Utc::now(),
        };

        tracing::info!(
            organisation_id = %request.organisation_id,
            requester = %request.requester_id,
            target = %request.target_id,
            kind = ?kind,
            "Organisation request submitted"
        );

        self.outbox.publish(Notification {
            recipient: self.config.administrator_email.clone(),
            payload: kind.payload(request.clone()),
        });

        Ok(request)
    }

    async fn require_organisation(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Organisation, Error> {
        self.repositories
            .organisation()
            .find_organisation(organisation_id)
            .await?
            .or_not_found("Organisation")
    }

    async fn require_owner(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
    ) -> Result<OrganisationMember, Error> {
        match self
            .repositories
            .organisation()
            .find_member(organisation_id, actor)
            .await?
        {
            Some(member) if member.role == MembershipRole::Owner => Ok(member),
            _ => {
                tracing::warn!(
                    organisation_id = %organisation_id,
                    actor = %actor,
                    "Owner operation attempted by non-owner"
                );
                Err(AccessError::NotOwner.into())
            }
        }
    }

    async fn require_member_or_admin(
        &self,
        actor: &UserId,
        organisation_id: &OrganisationId,
    ) -> Result<(), Error> {
        if self
            .repositories
            .organisation()
            .find_member(organisation_id, actor)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let is_admin = self
            .repositories
            .user()
            .find_by_id(actor)
            .await?
            .is_some_and(|u| u.is_admin);
        if is_admin {
            return Ok(());
        }

        tracing::warn!(
            organisation_id = %organisation_id,
            actor = %actor,
            "Restrictions requested by a user outside the organisation"
        );
        Err(AccessError::NotFound("Organisation".to_string()).into())
    }

    async fn require_restrictable_member(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
    ) -> Result<OrganisationMember, Error> {
        self.repositories
            .organisation()
            .find_member(organisation_id, user_id)
            .await?
            .filter(OrganisationMember::is_restrictable)
            .or_not_found("Member")
    }

    async fn require_case(
        &self,
        organisation_id: &OrganisationId,
        case_id: &CaseId,
    ) -> Result<Case, Error> {
        self.repositories
            .organisation()
            .find_case(case_id)
            .await?
            .filter(|case| &case.organisation_id == organisation_id)
            .or_not_found("Case")
    }

    async fn restrictable_members(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<OrganisationMember>, Error> {
        Ok(self
            .repositories
            .organisation()
            .list_members(organisation_id)
            .await?
            .into_iter()
            .filter(OrganisationMember::is_restrictable)
            .collect())
    }

    async fn build_matrix(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<RestrictionMatrix, Error> {
        let members: Vec<RestrictableMember> = self
            .restrictable_members(organisation_id)
            .await?
            .iter()
            .map(RestrictableMember::from)
            .collect();
        let cases = self
            .repositories
            .organisation()
            .list_cases(organisation_id)
            .await?;
        let entries = self
            .repositories
            .restriction()
            .list_for_organisation(organisation_id)
            .await?;

        Ok(RestrictionMatrix::new(
            organisation_id.clone(),
            members,
            cases,
            entries,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        notification::NotificationReceiver, storage::NewUser, test_support::MemoryRepositories,
    };

    struct Fixture {
        service: AccessRestrictionService<MemoryRepositories>,
        repos: Arc<MemoryRepositories>,
        notifications: NotificationReceiver,
        org: OrganisationId,
        owner: UserId,
        member: UserId,
        other_member: UserId,
        admin: UserId,
        cases: Vec<CaseId>,
    }

    async fn add_user(
        repos: &MemoryRepositories,
        org: &OrganisationId,
        email: &str,
        role: MembershipRole,
        is_admin: bool,
    ) -> UserId {
        let user = UserRepository::create(
            repos,
            NewUser::builder()
                .email(email)
                .is_admin(is_admin)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
        repos.upsert_member(org, &user.id, role).await.unwrap();
        user.id
    }

    async fn fixture() -> Fixture {
        let repos = Arc::new(MemoryRepositories::default());
        let (outbox, notifications) = NotificationOutbox::channel();
        let org = repos.create_organisation("Acme Ltd").await.unwrap().id;

        let owner = add_user(&repos, &org, "owner@acme.test", MembershipRole::Owner, false).await;
        let member = add_user(&repos, &org, "member@acme.test", MembershipRole::Member, false).await;
        let other_member =
            add_user(&repos, &org, "other@acme.test", MembershipRole::Member, false).await;
        let admin = add_user(&repos, &org, "admin@acclaim.test", MembershipRole::Member, true).await;

        let mut cases = Vec::new();
        for reference in ["ACM-001", "ACM-002", "ACM-003"] {
            cases.push(repos.create_case(&org, reference).await.unwrap().id);
        }

        let service = AccessRestrictionService::new(
            repos.clone(),
            outbox,
            AccessConfig::default().with_administrator_email("accounts@acclaim.test"),
        );

        Fixture {
            service,
            repos,
            notifications,
            org,
            owner,
            member,
            other_member,
            admin,
            cases,
        }
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let f = fixture().await;
        let case = &f.cases[0];

        let first = f
            .service
            .toggle_restriction(&f.owner, &f.org, &f.member, case)
            .await
            .unwrap();
        assert_eq!(first, RestrictionState::Restricted);
        assert_eq!(f.repos.restriction_count(), 1);

        let second = f
            .service
            .toggle_restriction(&f.owner, &f.org, &f.member, case)
            .await
            .unwrap();
        assert_eq!(second, RestrictionState::Allowed);
        assert_eq!(f.repos.restriction_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_member_restriction_is_a_snapshot() {
        let f = fixture().await;

        let updated = f
            .service
            .bulk_member_restriction(&f.owner, &f.org, &f.member, RestrictionAction::RestrictAll)
            .await
            .unwrap();
        assert_eq!(updated, 3);
        assert!(f.service.visible_cases(&f.org, &f.member).await.unwrap().is_empty());

        let new_case = f.repos.create_case(&f.org, "ACM-004").await.unwrap();
        let visible = f.service.visible_cases(&f.org, &f.member).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, new_case.id);

        let updated = f
            .service
            .bulk_member_restriction(&f.owner, &f.org, &f.member, RestrictionAction::AllowAll)
            .await
            .unwrap();
        assert_eq!(updated, 4);
        assert_eq!(f.repos.restriction_count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_case_restriction_skips_owners_and_admins() {
        let f = fixture().await;
        let case = &f.cases[1];

        let updated = f
            .service
            .bulk_case_restriction(&f.owner, &f.org, case, RestrictionAction::RestrictAll)
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let restrictions = f.service.get_restrictions(&f.owner, &f.org).await.unwrap();
        let users: Vec<_> = restrictions.iter().map(|e| e.user_id.clone()).collect();
        assert!(users.contains(&f.member));
        assert!(users.contains(&f.other_member));
        assert!(!users.contains(&f.owner));
        assert!(!users.contains(&f.admin));
    }

    #[tokio::test]
    async fn test_non_owner_bulk_case_restriction_is_unauthorized() {
        let f = fixture().await;
        f.service
            .toggle_restriction(&f.owner, &f.org, &f.other_member, &f.cases[2])
            .await
            .unwrap();
        let before = f.service.get_restrictions(&f.owner, &f.org).await.unwrap();

        let err = f
            .service
            .bulk_case_restriction(&f.member, &f.org, &f.cases[0], RestrictionAction::RestrictAll)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotOwner)));

        let after = f.service.get_restrictions(&f.owner, &f.org).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_platform_admin_without_ownership_cannot_mutate() {
        let f = fixture().await;
        let err = f
            .service
            .toggle_restriction(&f.admin, &f.org, &f.member, &f.cases[0])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotOwner)));
    }

    #[tokio::test]
    async fn test_not_found_is_distinct_from_unauthorized() {
        let f = fixture().await;

        let err = f
            .service
            .toggle_restriction(&f.owner, &OrganisationId::new("org_missing"), &f.member, &f.cases[0])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotFound(ref r)) if r == "Organisation"));

        let err = f
            .service
            .toggle_restriction(&f.owner, &f.org, &UserId::new("usr_missing"), &f.cases[0])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotFound(ref r)) if r == "Member"));

        let err = f
            .service
            .toggle_restriction(&f.owner, &f.org, &f.member, &CaseId::new("case_missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotFound(ref r)) if r == "Case"));
    }

    #[tokio::test]
    async fn test_admins_and_owners_cannot_be_restricted() {
        let f = fixture().await;
        for target in [&f.admin, &f.owner] {
            let err = f
                .service
                .toggle_restriction(&f.owner, &f.org, target, &f.cases[0])
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }
    }

    #[tokio::test]
    async fn test_case_from_other_organisation_is_not_found() {
        let f = fixture().await;
        let other_org = f.repos.create_organisation("Other").await.unwrap().id;
        let foreign_case = f.repos.create_case(&other_org, "OTH-1").await.unwrap().id;

        let err = f
            .service
            .toggle_restriction(&f.owner, &f.org, &f.member, &foreign_case)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_restrictions_are_scoped_per_organisation() {
        let f = fixture().await;
        let second = f.repos.create_organisation("Second").await.unwrap().id;
        f.repos
            .upsert_member(&second, &f.owner, MembershipRole::Owner)
            .await
            .unwrap();
        f.repos
            .upsert_member(&second, &f.member, MembershipRole::Member)
            .await
            .unwrap();
        f.repos.create_case(&second, "SEC-1").await.unwrap();

        f.service
            .bulk_member_restriction(&f.owner, &f.org, &f.member, RestrictionAction::RestrictAll)
            .await
            .unwrap();

        assert!(f.service.get_restrictions(&f.member, &second).await.unwrap().is_empty());
        assert_eq!(f.service.visible_cases(&second, &f.member).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_orphaned_entries_are_ignored_by_readers() {
        let f = fixture().await;
        f.service
            .bulk_member_restriction(&f.owner, &f.org, &f.member, RestrictionAction::RestrictAll)
            .await
            .unwrap();
        f.service
            .toggle_restriction(&f.owner, &f.org, &f.other_member, &f.cases[0])
            .await
            .unwrap();

        f.repos.remove_member(&f.org, &f.member);
        f.repos.remove_case(&f.cases[0]);

        // rows are still stored
        assert_eq!(f.repos.restriction_count(), 4);
        assert!(f.service.get_restrictions(&f.owner, &f.org).await.unwrap().is_empty());

        let matrix = f.service.restriction_matrix(&f.owner, &f.org).await.unwrap();
        assert_eq!(matrix.members.len(), 1);
        assert_eq!(matrix.cases.len(), 2);
        assert!(matrix.restricted.is_empty());
    }

    #[tokio::test]
    async fn test_matrix_lists_only_restrictable_members() {
        let f = fixture().await;
        f.service
            .toggle_restriction(&f.owner, &f.org, &f.member, &f.cases[1])
            .await
            .unwrap();

        let matrix = f.service.restriction_matrix(&f.owner, &f.org).await.unwrap();
        let ids: Vec<_> = matrix.members.iter().map(|m| m.user_id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&f.admin));
        assert!(!ids.contains(&f.owner));
        assert!(matrix.lookup(&f.member, &f.cases[1]).is_restricted());
        assert_eq!(matrix.lookup(&f.member, &f.cases[0]), RestrictionState::Allowed);

        let err = f
            .service
            .restriction_matrix(&f.member, &f.org)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotOwner)));
    }

    #[tokio::test]
    async fn test_admin_bypasses_restrictions() {
        let f = fixture().await;
        // stored directly; the engine never writes a row for an admin
        f.repos
            .set(&f.org, &f.admin, &f.cases[0], RestrictionState::Restricted)
            .await
            .unwrap();

        assert_eq!(f.service.visible_cases(&f.org, &f.admin).await.unwrap().len(), 3);
        assert!(
            f.service
                .is_case_visible(&f.org, &f.admin, &f.cases[0])
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_outsider_sees_nothing() {
        let f = fixture().await;
        let outsider = UserRepository::create(
            f.repos.as_ref(),
            NewUser::builder().email("outsider@elsewhere.test").build().unwrap(),
        )
        .await
        .unwrap();
        assert!(f.service.visible_cases(&f.org, &outsider.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restrictions_are_hidden_from_other_tenants() {
        let f = fixture().await;
        f.service
            .toggle_restriction(&f.owner, &f.org, &f.member, &f.cases[0])
            .await
            .unwrap();

        let rival = f.repos.create_organisation("Rival Ltd").await.unwrap().id;
        let outsider = add_user(
            &f.repos,
            &rival,
            "owner@rival.test",
            MembershipRole::Owner,
            false,
        )
        .await;

        let err = f
            .service
            .get_restrictions(&outsider, &f.org)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotFound(ref r)) if r == "Organisation"));

        // members read the list, restricted or not
        assert_eq!(
            f.service
                .get_restrictions(&f.member, &f.org)
                .await
                .unwrap()
                .len(),
            1
        );

        // a platform administrator needs no membership
        let staff = add_user(
            &f.repos,
            &rival,
            "staff@acclaim.test",
            MembershipRole::Member,
            true,
        )
        .await;
        assert_eq!(
            f.service
                .get_restrictions(&staff, &f.org)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_requests_notify_administrator_without_mutating() {
        let mut f = fixture().await;
        let members_before = f.repos.list_members(&f.org).await.unwrap();

        let request = f
            .service
            .request_member_removal(&f.owner, &f.org, &f.member, Some("  Left the company  "))
            .await
            .unwrap();
        assert_eq!(request.reason.as_deref(), Some("Left the company"));
        assert_eq!(request.organisation_name, "Acme Ltd");
        assert_eq!(request.requester_email, "owner@acme.test");
        assert_eq!(request.target_email, "member@acme.test");

        f.service
            .request_owner_delegation(&f.owner, &f.org, &f.other_member, None)
            .await
            .unwrap();
        f.service
            .request_ownership_removal(&f.owner, &f.org, &f.owner, None)
            .await
            .unwrap();

        let sent = f.notifications.drain();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|n| n.recipient == "accounts@acclaim.test"));
        assert_eq!(sent[0].payload.kind(), "member_removal_request");
        assert_eq!(sent[1].payload.kind(), "owner_delegation_request");
        assert_eq!(sent[2].payload.kind(), "ownership_removal_request");

        assert_eq!(f.repos.list_members(&f.org).await.unwrap(), members_before);
    }

    #[tokio::test]
    async fn test_request_target_checks() {
        let mut f = fixture().await;

        let err = f
            .service
            .request_owner_delegation(&f.owner, &f.org, &f.owner, None)
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        let err = f
            .service
            .request_ownership_removal(&f.owner, &f.org, &f.member, None)
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        let err = f
            .service
            .request_member_removal(&f.owner, &f.org, &UserId::new("usr_missing"), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = f
            .service
            .request_member_removal(&f.member, &f.org, &f.other_member, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Access(AccessError::NotOwner)));

        let long_reason = "x".repeat(2001);
        let err = f
            .service
            .request_member_removal(&f.owner, &f.org, &f.member, Some(&long_reason))
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        assert!(f.notifications.drain().is_empty());
    }
}
