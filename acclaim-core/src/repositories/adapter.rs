//! Adapters exposing one repository of a [`RepositoryProvider`] as a
//! standalone repository.
//!
//! Services hold an `Arc` to the repository they use. The provider only
//! lends out references, so these wrappers own an `Arc` of the provider and
//! delegate.

use crate::{
    Error, Session, User, UserId,
    credential::StoredCredentials,
    repositories::{
        LoginHistoryRepository, PasswordRepository, RepositoryProvider, SessionRepository,
        UserRepository,
    },
    session::SessionToken,
    storage::{LoginHistoryEntry, NewUser},
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        self.provider.user().create(user).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.provider.user().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_email(email).await
    }

    async fn set_login_notifications(&self, user_id: &UserId, enabled: bool) -> Result<(), Error> {
        self.provider
            .user()
            .set_login_notifications(user_id, enabled)
            .await
    }
}

pub struct SessionRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> SessionRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> SessionRepository for SessionRepositoryAdapter<R> {
    async fn create(&self, session: Session) -> Result<Session, Error> {
        self.provider.session().create(session).await
    }

    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        self.provider.session().find_by_token(token).await
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), Error> {
        self.provider.session().delete(token).await
    }

    async fn delete_by_user_id(&self, user_id: &UserId) -> Result<(), Error> {
        self.provider.session().delete_by_user_id(user_id).await
    }

    async fn cleanup_expired(&self) -> Result<(), Error> {
        self.provider.session().cleanup_expired().await
    }
}

pub struct PasswordRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> PasswordRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> PasswordRepository for PasswordRepositoryAdapter<R> {
    async fn get_credentials(&self, user_id: &UserId) -> Result<StoredCredentials, Error> {
        self.provider.password().get_credentials(user_id).await
    }

    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.provider.password().set_password_hash(user_id, hash).await
    }

    async fn set_temporary_password(
        &self,
        user_id: &UserId,
        temporary_password: Option<&str>,
    ) -> Result<(), Error> {
        self.provider
            .password()
            .set_temporary_password(user_id, temporary_password)
            .await
    }
}

pub struct LoginHistoryRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginHistoryRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginHistoryRepository for LoginHistoryRepositoryAdapter<R> {
    async fn record(&self, entry: LoginHistoryEntry) -> Result<(), Error> {
        self.provider.login_history().record(entry).await
    }

    async fn is_new_location(
        &self,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<bool, Error> {
        self.provider
            .login_history()
            .is_new_location(email, ip_address, user_agent)
            .await
    }
}
