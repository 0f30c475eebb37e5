//! User service trait definition.

use crate::dto::{CreateUserRequest, UpdateUserRequest};
use async_trait::async_trait;
use keel_core::{KeelResult, Page, RequestContext, User, UserId};

/// User service trait.
///
/// Every operation runs under the caller's [`RequestContext`].
#[async_trait]
pub trait UserService: Send + Sync {
    /// Creates a new user.
    async fn create_user(&self, ctx: &RequestContext, request: CreateUserRequest)
        -> KeelResult<User>;

    /// Gets a user by ID, serving from the cache when possible.
    async fn get_user(&self, ctx: &RequestContext, id: UserId) -> KeelResult<User>;

    /// Gets a user by email straight from the store.
    async fn get_user_by_email(&self, ctx: &RequestContext, email: &str) -> KeelResult<User>;

    /// Lists users newest first. `page` and `page_size` are clamped.
    async fn list_users(
        &self,
        ctx: &RequestContext,
        page: i64,
        page_size: i64,
    ) -> KeelResult<Page<User>>;

    /// Overwrites a user's email and name.
    async fn update_user(
        &self,
        ctx: &RequestContext,
        id: UserId,
        request: UpdateUserRequest,
    ) -> KeelResult<User>;

    /// Deletes a user.
    async fn delete_user(&self, ctx: &RequestContext, id: UserId) -> KeelResult<()>;
}
