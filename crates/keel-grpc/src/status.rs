//! Mapping from domain errors to gRPC status codes.

use keel_core::{ErrorKind, KeelError};
use tonic::Status;
use tracing::{debug, error};

/// Message returned for every internal failure.
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// Converts a [`KeelError`] into a [`Status`].
///
/// Internal errors are logged with their full cause chain and reported to
/// the caller with a generic message only.
#[must_use]
pub fn to_status(err: KeelError) -> Status {
    match err.kind() {
        ErrorKind::NotFound => {
            debug!(error = %err, "Not found");
            Status::not_found(err.to_string())
        }
        ErrorKind::Invalid => {
            debug!(error = %err, "Invalid argument");
            match err {
                KeelError::Validation(msg) => Status::invalid_argument(msg),
                other => Status::invalid_argument(other.to_string()),
            }
        }
        ErrorKind::Conflict => {
            debug!(error = %err, "Conflict");
            match err {
                KeelError::Conflict(msg) => Status::already_exists(msg),
                other => Status::already_exists(other.to_string()),
            }
        }
        ErrorKind::Unavailable => {
            error!(error = ?err, "Dependency unavailable");
            Status::unavailable(err.to_string())
        }
        ErrorKind::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
        ErrorKind::Cancelled => Status::cancelled(err.to_string()),
        ErrorKind::Internal => {
            error!(error = ?err, "Internal error");
            Status::internal(INTERNAL_MESSAGE)
        }
    }
}
