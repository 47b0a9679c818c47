//! New-location login detection.
//!
//! A login is from a "new location" when the account has no earlier
//! successful login with exactly the same IP address and user agent. There is
//! no fuzzy matching; a browser update or a different network both count.

use std::sync::Arc;

use chrono::Utc;

use crate::{Error, repositories::LoginHistoryRepository, storage::LoginHistoryEntry};

pub struct LoginLocationService<R: LoginHistoryRepository> {
    repository: Arc<R>,
}

impl<R: LoginHistoryRepository> LoginLocationService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Pure read; calling it repeatedly gives the same answer until a login is recorded.
    pub async fn is_new_location(
        &self,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<bool, Error> {
        self.repository
            .is_new_location(email, ip_address, user_agent)
            .await
    }

    /// Append a successful login to the history, new location or not.
    pub async fn record_login(
        &self,
        email: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<(), Error> {
        self.repository
            .record(LoginHistoryEntry {
                email: email.to_string(),
                ip_address: ip_address.to_string(),
                user_agent: user_agent.to_string(),
                logged_in_at: Utc::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockLoginHistoryRepository {
        entries: Mutex<Vec<LoginHistoryEntry>>,
    }

    #[async_trait]
    impl LoginHistoryRepository for MockLoginHistoryRepository {
        async fn record(&self, entry: LoginHistoryEntry) -> Result<(), Error> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        async fn is_new_location(
            &self,
            email: &str,
            ip_address: &str,
            user_agent: &str,
        ) -> Result<bool, Error> {
            let entries = self.entries.lock().unwrap();
            Ok(!entries.iter().any(|e| {
                e.email.eq_ignore_ascii_case(email)
                    && e.ip_address == ip_address
                    && e.user_agent == user_agent
            }))
        }
    }

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/130.0";

    fn service() -> (
        LoginLocationService<MockLoginHistoryRepository>,
        Arc<MockLoginHistoryRepository>,
    ) {
        let repo = Arc::new(MockLoginHistoryRepository::default());
        (LoginLocationService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_first_login_is_new() {
        let (service, _) = service();
        assert!(
            service
                .is_new_location("user@example.com", "10.0.0.1", UA)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_check_is_a_pure_read() {
        let (service, repo) = service();
        let first = service
            .is_new_location("user@example.com", "10.0.0.1", UA)
            .await
            .unwrap();
        let second = service
            .is_new_location("user@example.com", "10.0.0.1", UA)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert!(repo.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_known_pair_is_not_new() {
        let (service, _) = service();
        service
            .record_login("user@example.com", "10.0.0.1", UA)
            .await
            .unwrap();

        assert!(
            !service
                .is_new_location("USER@example.com", "10.0.0.1", UA)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_any_change_is_new() {
        let (service, _) = service();
        service
            .record_login("user@example.com", "10.0.0.1", UA)
            .await
            .unwrap();

        assert!(
            service
                .is_new_location("user@example.com", "10.0.0.2", UA)
                .await
                .unwrap()
        );
        assert!(
            service
                .is_new_location("user@example.com", "10.0.0.1", "curl/8.0")
                .await
                .unwrap()
        );
        assert!(
            service
                .is_new_location("other@example.com", "10.0.0.1", UA)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_history_only_grows() {
        let (service, repo) = service();
        for _ in 0..3 {
            service
                .record_login("user@example.com", "10.0.0.1", UA)
                .await
                .unwrap();
        }
        assert_eq!(repo.entries.lock().unwrap().len(), 3);
    }
}
