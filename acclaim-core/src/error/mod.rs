pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Failures of a login attempt.
///
/// The messages are safe to show to an end user. `InvalidCredentials` never
/// says whether the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials { attempts_remaining: Option<u32> },

    #[error("Too many failed login attempts. Try again in {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Authentication required")]
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Only organisation owners can perform this action")]
    NotOwner,

    #[error("Administrator privileges required")]
    AdminRequired,

    #[error("{0} not found")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Weak password")]
    WeakPassword,

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::Auth(AuthError::RateLimited { .. }))
    }

    pub fn is_access_error(&self) -> bool {
        matches!(self, Error::Access(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Access(AccessError::NotFound(_)) | Error::Storage(StorageError::NotFound)
        )
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }

    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let auth_error = Error::Auth(AuthError::InvalidCredentials {
            attempts_remaining: Some(3),
        });
        assert_eq!(
            auth_error.to_string(),
            "Authentication error: Invalid email or password"
        );

        let validation_error =
            Error::Validation(ValidationError::InvalidEmail("test@".to_string()));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Invalid email format: test@"
        );

        let storage_error = Error::Storage(StorageError::NotFound);
        assert_eq!(storage_error.to_string(), "Storage error: Record not found");
    }

    #[test]
    fn test_invalid_credentials_message_is_generic() {
        let unknown_account = AuthError::InvalidCredentials {
            attempts_remaining: None,
        };
        let wrong_password = AuthError::InvalidCredentials {
            attempts_remaining: Some(4),
        };
        assert_eq!(unknown_account.to_string(), wrong_password.to_string());
    }

    #[test]
    fn test_rate_limited_display() {
        let err = AuthError::RateLimited {
            retry_after_seconds: 900,
        };
        assert_eq!(
            err.to_string(),
            "Too many failed login attempts. Try again in 900 seconds"
        );
    }

    #[test]
    fn test_access_error_variants() {
        assert_eq!(
            AccessError::NotOwner.to_string(),
            "Only organisation owners can perform this action"
        );
        assert_eq!(
            AccessError::NotFound("Case".to_string()).to_string(),
            "Case not found"
        );
    }

    #[test]
    fn test_error_predicates() {
        let locked: Error = AuthError::RateLimited {
            retry_after_seconds: 10,
        }
        .into();
        assert!(locked.is_auth_error());
        assert!(locked.is_rate_limited());
        assert!(!locked.is_access_error());

        let not_owner: Error = AccessError::NotOwner.into();
        assert!(not_owner.is_access_error());
        assert!(!not_owner.is_not_found());

        let missing: Error = AccessError::NotFound("Organisation".to_string()).into();
        assert!(missing.is_not_found());

        assert!(Error::Storage(StorageError::NotFound).is_storage_error());
        assert!(Error::Validation(ValidationError::WeakPassword).is_validation_error());
        assert!(
            Error::Crypto(CryptoError::MalformedCredential("$bogus".to_string())).is_crypto_error()
        );
    }

    #[test]
    fn test_notification_error_variants() {
        let transport = NotificationError::Transport("smtp timeout".to_string());
        assert_eq!(transport.to_string(), "Transport failure: smtp timeout");
        let error: Error = transport.into();
        assert!(matches!(error, Error::Notification(_)));
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = ValidationError::WeakPassword.into();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::WeakPassword)
        ));

        let error: Error = SessionError::Expired.into();
        assert!(error.is_session_error());
    }
}
