//! Error types for canon.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::header::HeaderError;

/// Result type alias using canon's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Which layer of the optimistic-lock check rejected an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDetail {
    /// The caller's expected revision does not match the latest stored one.
    Stale { expected: i32, actual: i32 },
    /// Another writer committed the same next revision first.
    Concurrent,
}

impl fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictDetail::Stale { expected, actual } => {
                write!(f, "expected {}, found {}.", expected, actual)
            }
            ConflictDetail::Concurrent => write!(f, "concurrent update detected."),
        }
    }
}

/// Core error type for canon operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database constraint rejected a write.
    ///
    /// `constraint` carries the constraint name when the backend reports one.
    #[error("Integrity violation: {message}")]
    Integrity {
        constraint: Option<String>,
        message: String,
    },

    /// Request failed validation before any work began
    #[error("Validation error: {0}")]
    Validation(String),

    /// Document header could not be parsed
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    /// Entity id did not resolve
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: &'static str, id: Uuid },

    /// Optimistic-lock check failed
    #[error("{kind} revision conflict: {detail}")]
    RevisionConflict {
        kind: &'static str,
        id: Uuid,
        detail: ConflictDetail,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payload storage encoding error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may refetch and retry the same logical operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RevisionConflict { .. })
    }

    /// Whether the error was raised before any side effect took place.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::Header(_))
    }

    /// Name of the violated constraint, when this is an integrity failure.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            Error::Integrity { constraint, .. } => constraint.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("At least one raw source is required.".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: At least one raw source is required."
        );
    }

    #[test]
    fn test_error_display_entity_not_found() {
        let id = Uuid::nil();
        let err = Error::EntityNotFound {
            kind: "Series profile",
            id,
        };
        assert_eq!(err.to_string(), format!("Series profile not found: {}", id));
    }

    #[test]
    fn test_error_display_stale_revision() {
        let err = Error::RevisionConflict {
            kind: "Series profile",
            id: Uuid::nil(),
            detail: ConflictDetail::Stale {
                expected: 1,
                actual: 3,
            },
        };
        assert_eq!(
            err.to_string(),
            "Series profile revision conflict: expected 1, found 3."
        );
    }

    #[test]
    fn test_error_display_concurrent_revision() {
        let err = Error::RevisionConflict {
            kind: "Episode template",
            id: Uuid::nil(),
            detail: ConflictDetail::Concurrent,
        };
        assert_eq!(
            err.to_string(),
            "Episode template revision conflict: concurrent update detected."
        );
    }

    #[test]
    fn test_error_display_integrity() {
        let err = Error::Integrity {
            constraint: Some("fk_source_document_job".to_string()),
            message: "insert violates foreign key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Integrity violation: insert violates foreign key"
        );
        assert_eq!(err.constraint(), Some("fk_source_document_job"));
    }

    #[test]
    fn test_error_display_header() {
        let err = Error::from(HeaderError::MissingTitle);
        assert_eq!(
            err.to_string(),
            "Header error: document header has no non-blank <title>"
        );
    }

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage("sentinel without payload".to_string());
        assert_eq!(err.to_string(), "Storage error: sentinel without payload");
    }

    #[test]
    fn test_only_revision_conflicts_are_retryable() {
        let conflict = Error::RevisionConflict {
            kind: "Series profile",
            id: Uuid::nil(),
            detail: ConflictDetail::Concurrent,
        };
        assert!(conflict.is_retryable());
        assert!(!Error::Validation("x".into()).is_retryable());
        assert!(!Error::EntityNotFound {
            kind: "Series profile",
            id: Uuid::nil()
        }
        .is_retryable());
        assert!(!Error::Integrity {
            constraint: None,
            message: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_header_errors_count_as_validation() {
        assert!(Error::from(HeaderError::MissingHeader).is_validation());
        assert!(Error::Validation("x".into()).is_validation());
        assert!(!Error::Internal("x".into()).is_validation());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(err.to_string().starts_with("I/O error:"));
    }
}
