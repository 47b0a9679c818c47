use crate::{Error, User, UserId, storage::NewUser};
use async_trait::async_trait;

/// Repository for user data access
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user
    async fn create(&self, user: NewUser) -> Result<User, Error>;

    /// Find a user by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;

    /// Find a user by email. Matching is case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Turn new-location login emails on or off for a user
    async fn set_login_notifications(&self, user_id: &UserId, enabled: bool)
    -> Result<(), Error>;
}
