//! In-memory repository provider for service tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    Error, Session, User, UserId,
    credential::StoredCredentials,
    id::{CaseId, OrganisationId},
    organisation::{
        Case, MembershipRole, Organisation, OrganisationMember, RestrictionEntry,
        RestrictionState,
    },
    repositories::*,
    session::SessionToken,
    storage::{AuditEvent, LoginAttemptLog, LoginHistoryEntry, NewUser, UserActivity},
};

#[derive(Default)]
pub(crate) struct MemoryRepositories {
    pub users: Mutex<Vec<User>>,
    pub credentials: Mutex<HashMap<UserId, StoredCredentials>>,
    pub sessions: Mutex<HashMap<String, Session>>,
    pub history: Mutex<Vec<LoginHistoryEntry>>,
    pub login_attempts: Mutex<Vec<LoginAttemptLog>>,
    pub activities: Mutex<Vec<UserActivity>>,
    pub audit_events: Mutex<Vec<AuditEvent>>,
    pub organisations: Mutex<Vec<Organisation>>,
    pub memberships: Mutex<Vec<(OrganisationId, UserId, MembershipRole)>>,
    pub cases: Mutex<Vec<Case>>,
    pub restrictions: Mutex<BTreeSet<(OrganisationId, RestrictionEntry)>>,
}

impl MemoryRepositories {
    /// Drop a membership without touching restriction rows.
    pub fn remove_member(&self, organisation_id: &OrganisationId, user_id: &UserId) {
        self.memberships
            .lock()
            .unwrap()
            .retain(|(o, u, _)| !(o == organisation_id && u == user_id));
    }

    /// Drop a case without touching restriction rows.
    pub fn remove_case(&self, case_id: &CaseId) {
        self.cases.lock().unwrap().retain(|c| &c.id != case_id);
    }

    pub fn restriction_count(&self) -> usize {
        self.restrictions.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for MemoryRepositories {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        let user = User::builder()
            .id(user.id)
            .email(user.email)
            .name(user.name)
            .organisation_id(user.organisation_id)
            .is_admin(user.is_admin)
            .must_change_password(user.must_change_password)
            .login_notifications_enabled(user.login_notifications_enabled)
            .build()?;
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        Ok(self.users.lock().unwrap().iter().find(|u| &u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn set_login_notifications(
        &self,
        user_id: &UserId,
        enabled: bool,
    ) -> Result<(), Error> {
        if let Some(user) = self.users.lock().unwrap().iter_mut().find(|u| &u.id == user_id) {
            user.login_notifications_enabled = enabled;
        }
        Ok(())
    }
}

#[async_trait]
impl PasswordRepository for MemoryRepositories {
    async fn get_credentials(&self, user_id: &UserId) -> Result<StoredCredentials, Error> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.credentials
            .lock()
            .unwrap()
            .entry(user_id.clone())
            .or_default()
            .password_hash = Some(hash.to_string());
        Ok(())
    }

    async fn set_temporary_password(
        &self,
        user_id: &UserId,
        temporary_password: Option<&str>,
    ) -> Result<(), Error> {
        self.credentials
            .lock()
            .unwrap()
            .entry(user_id.clone())
            .or_default()
            .temporary_password = temporary_password.map(str::to_string);
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryRepositories {
    async fn create(&self, session: Session) -> Result<Session, Error> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.token.storage_key(), session.clone());
        Ok(session)
    }

    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(&token.storage_key())
            .cloned())
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), Error> {
        self.sessions.lock().unwrap().remove(&token.storage_key());
        Ok(())
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<(), Error> {
        self.sessions
            .lock()
            .unwrap()
            .retain(|_, s| &s.user_id != user_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        self.sessions.lock().unwrap().retain(|_, s| !s.is_expired());
        Ok(())
    }
}

#[async_trait]
impl LoginHistoryRepository for MemoryRepositories {
    async fn record(&self, entry: LoginHistoryEntry) -> Result<(), Error> {
        self.history.lock().unwrap().push(entry);
        Ok(())
    }

    async fn is_new_location(
        &self,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<bool, Error> {
        Ok(!self.history.lock().unwrap().iter().any(|e| {
            e.email.eq_ignore_ascii_case(email)
                && e.ip_address == ip_address
                && e.user_agent == user_agent
        }))
    }
}

#[async_trait]
impl AuditRepository for MemoryRepositories {
    async fn log_login_attempt(&self, attempt: LoginAttemptLog) -> Result<(), Error> {
        self.login_attempts.lock().unwrap().push(attempt);
        Ok(())
    }

    async fn log_user_activity(&self, activity: UserActivity) -> Result<(), Error> {
        self.activities.lock().unwrap().push(activity);
        Ok(())
    }

    async fn log_audit_event(&self, event: AuditEvent) -> Result<(), Error> {
        self.audit_events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl OrganisationRepository for MemoryRepositories {
    async fn create_organisation(&self, name: &str) -> Result<Organisation, Error> {
        let organisation = Organisation {
            id: OrganisationId::new_random(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.organisations.lock().unwrap().push(organisation.clone());
        Ok(organisation)
    }

    async fn find_organisation(&self, id: &OrganisationId) -> Result<Option<Organisation>, Error> {
        Ok(self
            .organisations
            .lock()
            .unwrap()
            .iter()
            .find(|o| &o.id == id)
            .cloned())
    }

    async fn upsert_member(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        role: MembershipRole,
    ) -> Result<(), Error> {
        let mut memberships = self.memberships.lock().unwrap();
        memberships.retain(|(o, u, _)| !(o == organisation_id && u == user_id));
        memberships.push((organisation_id.clone(), user_id.clone(), role));
        Ok(())
    }

    async fn find_member(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
    ) -> Result<Option<OrganisationMember>, Error> {
        Ok(self
            .list_members(organisation_id)
            .await?
            .into_iter()
            .find(|m| &m.user_id == user_id))
    }

    async fn list_members(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<OrganisationMember>, Error> {
        let memberships = self.memberships.lock().unwrap().clone();
        let users = self.users.lock().unwrap();
        Ok(memberships
            .into_iter()
            .filter(|(o, _, _)| o == organisation_id)
            .filter_map(|(_, user_id, role)| {
                users.iter().find(|u| u.id == user_id).map(|u| OrganisationMember {
                    user_id: u.id.clone(),
                    name: u.name.clone(),
                    email: u.email.clone(),
                    is_admin: u.is_admin,
                    role,
                })
            })
            .collect())
    }

    async fn owned_organisations(&self, user_id: &UserId) -> Result<Vec<OrganisationId>, Error> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, u, role)| u == user_id && *role == MembershipRole::Owner)
            .map(|(o, _, _)| o.clone())
            .collect())
    }

    async fn create_case(
        &self,
        organisation_id: &OrganisationId,
        reference: &str,
    ) -> Result<Case, Error> {
        let case = Case {
            id: CaseId::new_random(),
            organisation_id: organisation_id.clone(),
            reference: reference.to_string(),
            created_at: Utc::now(),
        };
        self.cases.lock().unwrap().push(case.clone());
        Ok(case)
    }

    async fn find_case(&self, id: &CaseId) -> Result<Option<Case>, Error> {
        Ok(self.cases.lock().unwrap().iter().find(|c| &c.id == id).cloned())
    }

    async fn list_cases(&self, organisation_id: &OrganisationId) -> Result<Vec<Case>, Error> {
        Ok(self
            .cases
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.organisation_id == organisation_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RestrictionRepository for MemoryRepositories {
    async fn list_for_organisation(
        &self,
        organisation_id: &OrganisationId,
    ) -> Result<Vec<RestrictionEntry>, Error> {
        Ok(self
            .restrictions
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| o == organisation_id)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn get(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
    ) -> Result<RestrictionState, Error> {
        let key = (
            organisation_id.clone(),
            RestrictionEntry {
                user_id: user_id.clone(),
                case_id: case_id.clone(),
            },
        );
        Ok(RestrictionState::from_restricted(
            self.restrictions.lock().unwrap().contains(&key),
        ))
    }

    async fn set(
        &self,
        organisation_id: &OrganisationId,
        user_id: &UserId,
        case_id: &CaseId,
        state: RestrictionState,
    ) -> Result<(), Error> {
        let key = (
            organisation_id.clone(),
            RestrictionEntry {
                user_id: user_id.clone(),
                case_id: case_id.clone(),
            },
        );
        let mut restrictions = self.restrictions.lock().unwrap();
        if state.is_restricted() {
            restrictions.insert(key);
        } else {
            restrictions.remove(&key);
        }
        Ok(())
    }
}

macro_rules! provide {
    ($provider:ident, $assoc:ident, $method:ident) => {
        impl $provider for MemoryRepositories {
            type $assoc = MemoryRepositories;

            fn $method(&self) -> &Self::$assoc {
                self
            }
        }
    };
}

provide!(UserRepositoryProvider, UserRepo, user);
provide!(SessionRepositoryProvider, SessionRepo, session);
provide!(PasswordRepositoryProvider, PasswordRepo, password);
provide!(LoginHistoryRepositoryProvider, LoginHistoryRepo, login_history);
provide!(AuditRepositoryProvider, AuditRepo, audit);
provide!(OrganisationRepositoryProvider, OrganisationRepo, organisation);
provide!(RestrictionRepositoryProvider, RestrictionRepo, restriction);

#[async_trait]
impl RepositoryProvider for MemoryRepositories {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
