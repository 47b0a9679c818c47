use crate::{
    Error, User, UserId,
    repositories::UserRepository,
    storage::NewUser,
    validation::{validate_email, validate_name},
};
use std::sync::Arc;

/// Service for user management operations
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create a new user after validating email and name
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, Error> {
        validate_email(&new_user.email)?;
        validate_name(&new_user.name)?;

        self.repository.create(new_user).await
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.repository.find_by_id(user_id).await
    }

    /// Get a user by email, ignoring case
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.repository.find_by_email(email).await
    }

    pub async fn set_login_notifications(
        &self,
        user_id: &UserId,
        enabled: bool,
    ) -> Result<(), Error> {
        self.repository
            .set_login_notifications(user_id, enabled)
            .await
    }
}
