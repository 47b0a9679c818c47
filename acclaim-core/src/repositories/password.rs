use crate::{Error, UserId, credential::StoredCredentials};
use async_trait::async_trait;

/// Repository for password material
///
/// Implementations hand back raw stored values; interpretation happens in
/// [`crate::credential`].
#[async_trait]
pub trait PasswordRepository: Send + Sync + 'static {
    /// Retrieve the stored temporary password and password hash for a user
    async fn get_credentials(&self, user_id: &UserId) -> Result<StoredCredentials, Error>;

    /// Store a password hash for a user
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error>;

    /// Set or clear the administrator-issued temporary password
    async fn set_temporary_password(
        &self,
        user_id: &UserId,
        temporary_password: Option<&str>,
    ) -> Result<(), Error>;
}
