//! Organisations, cases and the per-(user, case) restriction matrix
//!
//! A restriction denies one member visibility of one case inside one
//! organisation. Storage is sparse: only restricted pairs are persisted, and
//! [`RestrictionMatrix::lookup`] makes the "absence means allowed" rule
//! explicit. Platform administrators and organisation owners are never
//! restriction targets.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{CaseId, OrganisationId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: OrganisationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub organisation_id: OrganisationId,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    Member,
    Owner,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Member => "member",
            MembershipRole::Owner => "owner",
        }
    }
}

impl std::str::FromStr for MembershipRole {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(MembershipRole::Member),
            "owner" => Ok(MembershipRole::Owner),
            other => Err(crate::error::ValidationError::InvalidField(format!(
                "Unknown membership role: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub organisation_id: OrganisationId,
    pub user_id: UserId,
    pub role: MembershipRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionState {
    #[default]
    Allowed,
    Restricted,
}

impl RestrictionState {
    pub fn from_restricted(restricted: bool) -> Self {
        if restricted {
            RestrictionState::Restricted
        } else {
            RestrictionState::Allowed
        }
    }

    pub fn is_restricted(self) -> bool {
        self == RestrictionState::Restricted
    }

    pub fn toggled(self) -> Self {
        match self {
            RestrictionState::Allowed => RestrictionState::Restricted,
            RestrictionState::Restricted => RestrictionState::Allowed,
        }
    }
}

/// Uniform action applied by the bulk restriction operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestrictionAction {
    RestrictAll,
    AllowAll,
}

impl RestrictionAction {
    pub fn target_state(self) -> RestrictionState {
        match self {
            RestrictionAction::RestrictAll => RestrictionState::Restricted,
            RestrictionAction::AllowAll => RestrictionState::Allowed,
        }
    }
}

/// A member of an organisation together with the user fields the access
/// engine needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganisationMember {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub role: MembershipRole,
}

impl OrganisationMember {
    /// Only plain members who are not platform administrators can be restricted.
    pub fn is_restrictable(&self) -> bool {
        self.role == MembershipRole::Member && !self.is_admin
    }
}

impl From<&OrganisationMember> for RestrictableMember {
    fn from(member: &OrganisationMember) -> Self {
        Self {
            user_id: member.user_id.clone(),
            name: member.name.clone(),
            email: member.email.clone(),
        }
    }
}

/// A restricted (user, case) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RestrictionEntry {
    pub user_id: UserId,
    pub case_id: CaseId,
}

/// A member who may be the target of a restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictableMember {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// Owner view over one organisation's restrictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictionMatrix {
    pub organisation_id: OrganisationId,
    pub members: Vec<RestrictableMember>,
    pub cases: Vec<Case>,
    pub restricted: BTreeSet<RestrictionEntry>,
}

impl RestrictionMatrix {
    /// Build a matrix, discarding entries whose user is not a current
    /// restrictable member or whose case no longer belongs to the organisation.
    pub fn new(
        organisation_id: OrganisationId,
        members: Vec<RestrictableMember>,
        cases: Vec<Case>,
        entries: impl IntoIterator<Item = RestrictionEntry>,
    ) -> Self {
        let restricted = entries
            .into_iter()
            .filter(|e| {
                members.iter().any(|m| m.user_id == e.user_id)
                    && cases.iter().any(|c| c.id == e.case_id)
            })
            .collect();

        Self {
            organisation_id,
            members,
            cases,
            restricted,
        }
    }

    pub fn lookup(&self, user_id: &UserId, case_id: &CaseId) -> RestrictionState {
        let key = RestrictionEntry {
            user_id: user_id.clone(),
            case_id: case_id.clone(),
        };
        RestrictionState::from_restricted(self.restricted.contains(&key))
    }

    pub fn restricted_pairs(&self) -> Vec<RestrictionEntry> {
        self.restricted.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, org: &OrganisationId) -> Case {
        Case {
            id: CaseId::new(id),
            organisation_id: org.clone(),
            reference: id.to_uppercase(),
            created_at: Utc::now(),
        }
    }

    fn member(id: &str) -> RestrictableMember {
        RestrictableMember {
            user_id: UserId::new(id),
            name: id.to_string(),
            email: format!("{id}@example.com"),
        }
    }

    #[test]
    fn test_lookup_defaults_to_allowed() {
        let org = OrganisationId::new("org_1");
        let matrix = RestrictionMatrix::new(
            org.clone(),
            vec![member("usr_a")],
            vec![case("case_1", &org)],
            Vec::new(),
        );

        assert_eq!(
            matrix.lookup(&UserId::new("usr_a"), &CaseId::new("case_1")),
            RestrictionState::Allowed
        );
        assert_eq!(
            matrix.lookup(&UserId::new("usr_unknown"), &CaseId::new("case_x")),
            RestrictionState::Allowed
        );
    }

    #[test]
    fn test_orphaned_entries_are_ignored() {
        let org = OrganisationId::new("org_1");
        let entries = vec![
            RestrictionEntry {
                user_id: UserId::new("usr_a"),
                case_id: CaseId::new("case_1"),
            },
            RestrictionEntry {
                user_id: UserId::new("usr_deleted"),
                case_id: CaseId::new("case_1"),
            },
            RestrictionEntry {
                user_id: UserId::new("usr_a"),
                case_id: CaseId::new("case_deleted"),
            },
        ];
        let matrix = RestrictionMatrix::new(
            org.clone(),
            vec![member("usr_a")],
            vec![case("case_1", &org)],
            entries,
        );

        assert_eq!(matrix.restricted_pairs().len(), 1);
        assert!(
            matrix
                .lookup(&UserId::new("usr_a"), &CaseId::new("case_1"))
                .is_restricted()
        );
    }

    #[test]
    fn test_state_toggle_is_an_involution() {
        for state in [RestrictionState::Allowed, RestrictionState::Restricted] {
            assert_eq!(state.toggled().toggled(), state);
            assert_ne!(state.toggled(), state);
        }
    }

    #[test]
    fn test_action_wire_format() {
        let action: RestrictionAction = serde_json::from_str("\"restrict-all\"").unwrap();
        assert_eq!(action, RestrictionAction::RestrictAll);
        assert_eq!(
            RestrictionAction::AllowAll.target_state(),
            RestrictionState::Allowed
        );
    }

    #[test]
    fn test_only_plain_members_are_restrictable() {
        let mut m = OrganisationMember {
            user_id: UserId::new("usr_a"),
            name: "A".to_string(),
            email: "a@example.com".to_string(),
            is_admin: false,
            role: MembershipRole::Member,
        };
        assert!(m.is_restrictable());

        m.role = MembershipRole::Owner;
        assert!(!m.is_restrictable());

        m.role = MembershipRole::Member;
        m.is_admin = true;
        assert!(!m.is_restrictable());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("owner".parse::<MembershipRole>().unwrap(), MembershipRole::Owner);
        assert!("admin".parse::<MembershipRole>().is_err());
    }
}
