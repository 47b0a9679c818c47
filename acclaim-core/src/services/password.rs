use crate::{
    Error, UserId,
    credential::{StoredCredentials, check_stored_hash, hash_password},
    repositories::PasswordRepository,
    validation::validate_password,
};
use std::sync::Arc;

/// Service for managing stored password material
///
/// Verification is not done here; the authentication gate reads
/// [`StoredCredentials`] and verifies them itself.
pub struct PasswordService<P: PasswordRepository> {
    repository: Arc<P>,
}

impl<P: PasswordRepository> PasswordService<P> {
    pub fn new(repository: Arc<P>) -> Self {
        Self { repository }
    }

    pub async fn credentials(&self, user_id: &UserId) -> Result<StoredCredentials, Error> {
        self.repository.get_credentials(user_id).await
    }

    /// Validate, hash and store a permanent password
    ///
    /// Does not touch any temporary password; clearing that belongs to the
    /// password-change flow.
    pub async fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), Error> {
        validate_password(password)?;

        let hash = hash_password(password);
        self.repository.set_password_hash(user_id, &hash).await
    }

    /// Store a pre-computed hash, e.g. one migrated from the legacy portal
    ///
    /// Hashes that no [`Credential`](crate::credential::Credential) could
    /// ever verify are rejected with a crypto error.
    pub async fn import_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        check_stored_hash(hash)?;
        self.repository.set_password_hash(user_id, hash).await
    }

    /// Set or clear an administrator-issued temporary password
    pub async fn set_temporary_password(
        &self,
        user_id: &UserId,
        temporary_password: Option<&str>,
    ) -> Result<(), Error> {
        self.repository
            .set_temporary_password(user_id, temporary_password)
            .await
    }
}
