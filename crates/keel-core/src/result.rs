//! Result type aliases for Keel.

use crate::KeelError;

/// A specialized `Result` type for Keel operations.
pub type KeelResult<T> = Result<T, KeelError>;
