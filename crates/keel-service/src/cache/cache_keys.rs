//! Cache key generators.

use keel_core::UserId;

/// Aggregate key invalidated on every write.
///
/// Nothing populates it. It is reserved for a list cache.
pub const USERS_LIST: &str = "users:list";

/// Key of a single user snapshot.
#[must_use]
pub fn user_by_id(id: UserId) -> String {
    format!("user:{id}")
}
