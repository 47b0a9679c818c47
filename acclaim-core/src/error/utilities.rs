use crate::{
    Error,
    error::{AccessError, StorageError, ValidationError},
};

/// Extension trait for Result types to simplify database error mapping
///
/// Storage backends use this to turn driver errors into [`StorageError::Database`].
///
/// # Example
///
/// ```ignore
/// use acclaim_core::error::utilities::DatabaseResultExt;
///
/// query.execute(&pool).await.map_db_err_with_context("Failed to record login")?;
/// ```
pub trait DatabaseResultExt<T> {
    /// Convert a database error to a storage error with additional context
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> DatabaseResultExt<T> for Result<T, E> {
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(format!("{context}: {e}"))))
    }
}

/// Extension trait for Option types to simplify required field validation
///
/// # Example
///
/// ```
/// use acclaim_core::error::utilities::RequiredFieldExt;
///
/// let email: Option<String> = Some("user@example.com".to_string());
/// let email = email.require_field("Email").unwrap();
/// assert_eq!(email, "user@example.com");
/// ```
pub trait RequiredFieldExt<T> {
    /// Convert None to a ValidationError::MissingField
    fn require_field(self, field_name: &str) -> Result<T, ValidationError>;
}

impl<T> RequiredFieldExt<T> for Option<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError> {
        self.ok_or_else(|| ValidationError::MissingField(format!("{field_name} is required")))
    }
}

/// Extension trait turning a missing lookup into [`AccessError::NotFound`]
///
/// Used by the access-restriction service so an unknown organisation, member
/// or case is reported distinctly from an authorization failure.
pub trait NotFoundExt<T> {
    fn or_not_found(self, resource: &str) -> Result<T, Error>;
}

impl<T> NotFoundExt<T> for Option<T> {
    fn or_not_found(self, resource: &str) -> Result<T, Error> {
        self.ok_or_else(|| Error::Access(AccessError::NotFound(resource.to_string())))
    }
}
