//! Portal users
//!
//! | Field                         | Type                     | Description                                              |
//! | ----------------------------- | ------------------------ | -------------------------------------------------------- |
//! | `id`                          | `UserId`                 | The unique identifier for the user.                      |
//! | `name`                        | `String`                 | Display name.                                            |
//! | `email`                       | `String`                 | Login email. Lookups are case-insensitive.               |
//! | `organisation_id`             | `Option<OrganisationId>` | Primary organisation, if any.                            |
//! | `is_admin`                    | `bool`                   | Platform administrator. Bypasses case restrictions.      |
//! | `must_change_password`        | `bool`                   | Set when the account is on a temporary password.         |
//! | `login_notifications_enabled` | `bool`                   | Whether new-location login emails are sent.              |
//! | `created_at`                  | `DateTime`               | The timestamp when the user was created.                 |
//! | `updated_at`                  | `DateTime`               | The timestamp when the user was last updated.            |
//!
//! Password material never lives on [`User`]; it is held by the credential
//! repository and only ever leaves it as a [`StoredCredentials`](crate::credential::StoredCredentials).
use crate::{
    Error,
    error::utilities::RequiredFieldExt,
    id::{OrganisationId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub organisation_id: Option<OrganisationId>,
    pub is_admin: bool,
    pub must_change_password: bool,
    pub login_notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    /// Build the identity payload returned to a client after login.
    pub fn to_authenticated(&self, owned_organisations: Vec<OrganisationId>) -> AuthenticatedUser {
        AuthenticatedUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            organisation_id: self.organisation_id.clone(),
            is_admin: self.is_admin,
            must_change_password: self.must_change_password,
            owned_organisations,
        }
    }
}

/// The minimal identity handed back to the front end.
///
/// Contains no password material of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub organisation_id: Option<OrganisationId>,
    pub is_admin: bool,
    pub must_change_password: bool,
    pub owned_organisations: Vec<OrganisationId>,
}

impl AuthenticatedUser {
    pub fn is_owner_of(&self, organisation_id: &OrganisationId) -> bool {
        self.owned_organisations.contains(organisation_id)
    }
}

#[derive(Default)]
pub struct UserBuilder {
    id: Option<UserId>,
    name: Option<String>,
    email: Option<String>,
    organisation_id: Option<OrganisationId>,
    is_admin: bool,
    must_change_password: bool,
    login_notifications_enabled: Option<bool>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl UserBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn organisation_id(mut self, organisation_id: Option<OrganisationId>) -> Self {
        self.organisation_id = organisation_id;
        self
    }

    pub fn is_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn must_change_password(mut self, must_change_password: bool) -> Self {
        self.must_change_password = must_change_password;
        self
    }

    pub fn login_notifications_enabled(mut self, enabled: bool) -> Self {
        self.login_notifications_enabled = Some(enabled);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn build(self) -> Result<User, Error> {
        let now = Utc::now();
        Ok(User {
            id: self.id.unwrap_or_else(UserId::new_random),
            name: self.name.unwrap_or_default(),
            email: self.email.require_field("Email")?,
            organisation_id: self.organisation_id,
            is_admin: self.is_admin,
            must_change_password: self.must_change_password,
            login_notifications_enabled: self.login_notifications_enabled.unwrap_or(true),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        })
    }
}
