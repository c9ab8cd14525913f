//! Services consumed by the request-handling layer.
//!
//! Each service receives its repositories and storage as trait objects. The
//! `from_registry` constructors resolve them from a [`Registry`](crate::Registry)
//! through the tokens in [`capabilities`](crate::container::capabilities).

mod guest;
mod guestbook;
mod session;
mod user;

pub use guest::GuestService;
pub use guestbook::GuestBookService;
pub use session::SessionService;
pub use user::UserService;

use thiserror::Error;

use crate::{repository::RepositoryError, storage::StorageError, RegistryError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{} not found", entity))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Trims `value` and fails with a validation error naming `field` if nothing is left.
fn required(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("realname", "  Anna ").unwrap(), "Anna");
        let err = required("realname", "   ").unwrap_err();
        assert_eq!(err.to_string(), "validation error: realname is required");
    }

    #[test]
    fn repository_conflict_maps_to_conflict() {
        let err: ServiceError = RepositoryError::Conflict("username anna is taken".into()).into();
        assert_eq!(err.to_string(), "conflict: username anna is taken");
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn unauthorized_message() {
        let err = ServiceError::Unauthorized("invalid refresh token".into());
        assert_eq!(err.to_string(), "unauthorized: invalid refresh token");
    }

    #[test]
    fn not_found_message() {
        assert_eq!(
            ServiceError::not_found("Guest").to_string(),
            "not found: Guest not found"
        );
    }
}
