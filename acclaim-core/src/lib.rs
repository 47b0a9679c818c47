//! Core of the Acclaim portal's authentication and case-access logic
//!
//! This crate holds the domain types, the repository traits that storage
//! backends implement, and the services built on top of them:
//!
//! - [`services::LoginRateLimiter`] throttles failed logins per source
//! - [`services::LoginLocationService`] decides whether a login is from a new place
//! - [`services::AuthenticationService`] is the single gate every login passes through
//! - [`services::AccessRestrictionService`] manages per-(member, case) visibility
//! - [`inactivity::InactivityController`] ends idle sessions after a warning
//!
//! Outbound email is never sent from here directly; services publish
//! [`notification::Notification`] intents on a [`notification::NotificationOutbox`].
//!
//! Application code normally uses the `acclaim` crate, which wires these
//! pieces together with a storage backend.
pub mod credential;
pub mod crypto;
pub mod error;
pub mod id;
pub mod inactivity;
pub mod notification;
pub mod organisation;
pub mod repositories;
pub mod services;
pub mod session;
pub mod storage;
pub mod user;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;
pub use id::{CaseId, OrganisationId, UserId};
pub use organisation::{RestrictionAction, RestrictionEntry, RestrictionMatrix, RestrictionState};
pub use session::{Session, SessionToken};
pub use user::{AuthenticatedUser, User};
