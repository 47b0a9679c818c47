//! Repository traits for the data access layer
//!
//! These traits are the persistence collaborator interface: services only
//! ever see them, never a concrete backend.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus lifecycle methods
//!
//! Rate-limit records live outside the provider. A [`RateLimitStore`] is
//! injected on its own and may sit in a different database than the users.

pub mod adapter;
pub mod audit;
pub mod login_history;
pub mod organisation;
pub mod password;
pub mod rate_limit;
pub mod restriction;
pub mod session;
pub mod user;

pub use adapter::{
    LoginHistoryRepositoryAdapter, PasswordRepositoryAdapter, SessionRepositoryAdapter,
    UserRepositoryAdapter,
};
pub use audit::AuditRepository;
pub use login_history::LoginHistoryRepository;
pub use organisation::OrganisationRepository;
pub use password::PasswordRepository;
pub use rate_limit::{InMemoryRateLimitStore, RateLimitStore};
pub use restriction::RestrictionRepository;
pub use session::SessionRepository;
pub use user::UserRepository;

use async_trait::async_trait;

use crate::Error;

// ============================================================================
// Individual Repository Provider Traits
// ============================================================================

/// Provider trait for user repository access.
pub trait UserRepositoryProvider: Send + Sync + 'static {
    type UserRepo: UserRepository;

    fn user(&self) -> &Self::UserRepo;
}

/// Provider trait for session repository access.
pub trait SessionRepositoryProvider: Send + Sync + 'static {
    type SessionRepo: SessionRepository;

    fn session(&self) -> &Self::SessionRepo;
}

/// Provider trait for password repository access.
pub trait PasswordRepositoryProvider: Send + Sync + 'static {
    type PasswordRepo: PasswordRepository;

    fn password(&self) -> &Self::PasswordRepo;
}

/// Provider trait for login history access.
pub trait LoginHistoryRepositoryProvider: Send + Sync + 'static {
    type LoginHistoryRepo: LoginHistoryRepository;

    fn login_history(&self) -> &Self::LoginHistoryRepo;
}

/// Provider trait for the audit trail.
pub trait AuditRepositoryProvider: Send + Sync + 'static {
    type AuditRepo: AuditRepository;

    fn audit(&self) -> &Self::AuditRepo;
}

/// Provider trait for organisations, memberships and cases.
pub trait OrganisationRepositoryProvider: Send + Sync + 'static {
    type OrganisationRepo: OrganisationRepository;

    fn organisation(&self) -> &Self::OrganisationRepo;
}

/// Provider trait for case-access restrictions.
pub trait RestrictionRepositoryProvider: Send + Sync + 'static {
    type RestrictionRepo: RestrictionRepository;

    fn restriction(&self) -> &Self::RestrictionRepo;
}

// ============================================================================
// Unified Repository Provider Trait
// ============================================================================

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement each individual `*Repository` trait for your backend
/// 2. Implement each individual `*RepositoryProvider` trait
/// 3. Implement the `RepositoryProvider` trait with `migrate()` and `health_check()`
///
/// ```rust,ignore
/// use acclaim_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl UserRepositoryProvider for MyStorage {
///     type UserRepo = MyUserRepository;
///     fn user(&self) -> &Self::UserRepo { &self.user_repo }
/// }
///
/// // ... implement other provider traits ...
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider:
    UserRepositoryProvider
    + SessionRepositoryProvider
    + PasswordRepositoryProvider
    + LoginHistoryRepositoryProvider
    + AuditRepositoryProvider
    + OrganisationRepositoryProvider
    + RestrictionRepositoryProvider
{
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
