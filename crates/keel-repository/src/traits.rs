//! Repository trait definitions.

use async_trait::async_trait;
use keel_core::{KeelResult, NewUser, User, UserId};

/// Persistent storage for user records.
///
/// The store is the system of record. Every error it returns is typed:
/// a duplicate email is [`KeelError::Conflict`](keel_core::KeelError::Conflict),
/// a lost connection is `Unavailable`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persists a new user and returns it with its assigned id.
    async fn create(&self, user: &NewUser) -> KeelResult<User>;

    /// Finds a user by id.
    async fn find_by_id(&self, id: UserId) -> KeelResult<Option<User>>;

    /// Finds a user by exact email.
    async fn find_by_email(&self, email: &str) -> KeelResult<Option<User>>;

    /// Returns up to `limit` users starting at `offset`, newest first.
    ///
    /// Ties on `created_at` are broken by id, highest first.
    async fn list(&self, limit: i64, offset: i64) -> KeelResult<Vec<User>>;

    /// Counts all users.
    async fn count(&self) -> KeelResult<u64>;

    /// Overwrites email, name and `updated_at` of an existing user.
    ///
    /// Returns `NotFound` if the row no longer exists.
    async fn update(&self, user: &User) -> KeelResult<User>;

    /// Deletes a user. Returns false if no row was affected.
    async fn delete(&self, id: UserId) -> KeelResult<bool>;
}
