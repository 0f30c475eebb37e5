//! Unified error types for all layers of the service.

use std::fmt;
use thiserror::Error;

/// Boxed error used as the cause of infrastructure failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for all layers of Keel.
///
/// Variants carry their cause through `#[source]` rather than folding it
/// into the message, so callers can walk the chain and tests can match on
/// [`ErrorKind`] instead of text.
#[derive(Error, Debug)]
pub enum KeelError {
    // ============ Domain Errors ============
    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Conflict error (e.g., duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error, raised before the store is reached
    #[error("Validation error: {0}")]
    Validation(String),

    // ============ Infrastructure Errors ============
    /// A backing component could not be reached
    #[error("{component} unavailable")]
    Unavailable {
        component: &'static str,
        #[source]
        source: BoxError,
    },

    /// Database error that is not a connectivity problem
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Redis/Cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ============ Request Lifecycle Errors ============
    /// The caller's deadline elapsed before the operation finished
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`KeelError`].
///
/// This is the vocabulary the transport layer maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Unavailable,
    DeadlineExceeded,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::Unavailable => "unavailable",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl KeelError {
    /// Returns the taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Invalid,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Database(_)
            | Self::Cache(_)
            | Self::Configuration(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unavailable { .. } => "UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Cancelled => "CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates an unavailable error for a named component.
    #[must_use]
    pub fn unavailable<E>(component: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Unavailable {
            component,
            source: source.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error is worth retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::DeadlineExceeded | Self::Cache(_)
        )
    }
}

impl From<sqlx::Error> for KeelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource_type: "database_row",
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    Self::Conflict(db_err.message().to_string())
                }
                sqlx::error::ErrorKind::CheckViolation
                | sqlx::error::ErrorKind::NotNullViolation => {
                    Self::Validation(db_err.message().to_string())
                }
                _ => Self::Database(sqlx::Error::Database(db_err)),
            },
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::unavailable("database", err),
            other => Self::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_kinds() {
        assert_eq!(KeelError::not_found("User", 1).kind(), ErrorKind::NotFound);
        assert_eq!(KeelError::conflict("dup").kind(), ErrorKind::Conflict);
        assert_eq!(KeelError::validation("bad").kind(), ErrorKind::Invalid);
        assert_eq!(KeelError::DeadlineExceeded.kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(KeelError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(KeelError::internal("oops").kind(), ErrorKind::Internal);
        assert_eq!(KeelError::Cache("down".to_string()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(KeelError::not_found("User", 1).error_code(), "NOT_FOUND");
        assert_eq!(KeelError::conflict("dup").error_code(), "CONFLICT");
        assert_eq!(KeelError::validation("bad").error_code(), "VALIDATION_ERROR");
        assert_eq!(KeelError::DeadlineExceeded.error_code(), "DEADLINE_EXCEEDED");
        assert_eq!(KeelError::internal("err").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_unavailable_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = KeelError::unavailable("cache", io);
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.to_string(), "cache unavailable");
        assert!(err.source().unwrap().to_string().contains("refused"));
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_not_found() {
        let err = KeelError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_sqlx_pool_timeout_maps_to_unavailable() {
        let err = KeelError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_retriable());
    }

    #[test]
    fn test_sqlx_other_maps_to_internal() {
        let err = KeelError::from(sqlx::Error::ColumnNotFound("email".to_string()));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_serde_error_converts() {
        let parse_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: KeelError = parse_err.into();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_not_retriable() {
        assert!(!KeelError::validation("bad").is_retriable());
        assert!(!KeelError::not_found("User", 1).is_retriable());
        assert!(!KeelError::conflict("dup").is_retriable());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::Invalid.to_string(), "invalid");
    }
}
