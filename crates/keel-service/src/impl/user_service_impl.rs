//! Cache-aside user service.

use crate::cache::{cache_keys, CacheExt, CacheInterface};
use crate::dto::{CreateUserRequest, EmailLookup, UpdateUserRequest};
use crate::user_service::UserService;
use async_trait::async_trait;
use keel_core::{
    timestamp_now, KeelError, KeelResult, NewUser, Page, PageRequest, RequestContext, User, UserId,
    ValidateExt,
};
use keel_repository::UserRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on each cache delete issued after a committed write.
pub const INVALIDATION_TIMEOUT: Duration = Duration::from_secs(2);

/// User service over a record store and a lookaside cache.
pub struct UserServiceImpl {
    user_repository: Arc<dyn UserRepository>,
    cache: Arc<dyn CacheInterface>,
    user_ttl: Duration,
}

impl UserServiceImpl {
    /// Creates a new user service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        cache: Arc<dyn CacheInterface>,
        user_ttl: Duration,
    ) -> Self {
        Self {
            user_repository,
            cache,
            user_ttl,
        }
    }

    /// Returns the cached snapshot of `id`, if any.
    ///
    /// Misses, backend errors and undecodable values all read as `None`.
    async fn cached_user(&self, ctx: &RequestContext, id: UserId) -> Option<User> {
        let key = cache_keys::user_by_id(id);
        match ctx.run(self.cache.get::<User>(&key)).await {
            Ok(Some(user)) => {
                debug!(user_id = %id, "User cache hit");
                Some(user)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, falling back to store");
                None
            }
        }
    }

    /// Writes the snapshot of `user` with the configured TTL.
    async fn populate(&self, ctx: &RequestContext, user: &User) {
        let key = cache_keys::user_by_id(user.id);
        if let Err(e) = ctx.run(self.cache.set(&key, user, self.user_ttl)).await {
            warn!(key = %key, error = %e, "Failed to cache user");
        }
    }

    /// Deletes `keys` in order. Every key is attempted.
    ///
    /// Runs after a committed store write, so it ignores the caller's
    /// deadline and cancellation. Each delete gets its own
    /// [`INVALIDATION_TIMEOUT`] instead.
    async fn invalidate(&self, keys: &[&str]) {
        for key in keys {
            let bounded = RequestContext::with_timeout(INVALIDATION_TIMEOUT);
            if let Err(e) = bounded.run(self.cache.delete(key)).await {
                warn!(key = %key, error = %e, "Failed to invalidate cache key");
            }
        }
    }

    async fn invalidate_user(&self, id: UserId) {
        let user_key = cache_keys::user_by_id(id);
        self.invalidate(&[user_key.as_str(), cache_keys::USERS_LIST])
            .await;
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn create_user(
        &self,
        ctx: &RequestContext,
        request: CreateUserRequest,
    ) -> KeelResult<User> {
        let request = request.normalized();
        request.validate_request()?;
        debug!(email = %request.email, "Creating user");

        let new_user = NewUser::new(request.email, request.name, timestamp_now());
        let user = ctx.run(self.user_repository.create(&new_user)).await?;

        self.invalidate(&[cache_keys::USERS_LIST]).await;

        info!(user_id = %user.id, "User created");
        Ok(user)
    }

    async fn get_user(&self, ctx: &RequestContext, id: UserId) -> KeelResult<User> {
        if let Some(user) = self.cached_user(ctx, id).await {
            return Ok(user);
        }

        debug!(user_id = %id, "Loading user from store");
        let user = ctx
            .run(self.user_repository.find_by_id(id))
            .await?
            .ok_or_else(|| KeelError::not_found("User", id))?;

        self.populate(ctx, &user).await;
        Ok(user)
    }

    async fn get_user_by_email(&self, ctx: &RequestContext, email: &str) -> KeelResult<User> {
        let lookup = EmailLookup::new(email);
        lookup.validate_request()?;
        debug!(email = %lookup.email, "Loading user by email");

        ctx.run(self.user_repository.find_by_email(&lookup.email))
            .await?
            .ok_or_else(|| KeelError::not_found("User", lookup.email))
    }

    async fn list_users(
        &self,
        ctx: &RequestContext,
        page: i64,
        page_size: i64,
    ) -> KeelResult<Page<User>> {
        let request = PageRequest::new(page, page_size);
        debug!(page = request.page, size = request.size, "Listing users");

        let users = ctx
            .run(self.user_repository.list(request.limit(), request.offset()))
            .await?;
        let total = ctx.run(self.user_repository.count()).await?;

        Ok(Page::new(users, request, total))
    }

    async fn update_user(
        &self,
        ctx: &RequestContext,
        id: UserId,
        request: UpdateUserRequest,
    ) -> KeelResult<User> {
        let request = request.normalized();
        request.validate_request()?;
        debug!(user_id = %id, "Updating user");

        let mut user = ctx
            .run(self.user_repository.find_by_id(id))
            .await?
            .ok_or_else(|| KeelError::not_found("User", id))?;

        user.apply_changes(request.email, request.name, timestamp_now());
        let updated = ctx.run(self.user_repository.update(&user)).await?;

        self.invalidate_user(id).await;

        info!(user_id = %id, "User updated");
        Ok(updated)
    }

    async fn delete_user(&self, ctx: &RequestContext, id: UserId) -> KeelResult<()> {
        debug!(user_id = %id, "Deleting user");

        let deleted = ctx.run(self.user_repository.delete(id)).await?;
        if !deleted {
            return Err(KeelError::not_found("User", id));
        }

        self.invalidate_user(id).await;

        info!(user_id = %id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use keel_core::{CancelSource, ErrorKind};
    use keel_repository::InMemoryUserRepository;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(300);

    // =========================================================================
    // Test doubles
    // =========================================================================

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum CacheOp {
        Get(String),
        Set(String, Duration),
        Delete(String),
    }

    /// Memory cache that records every call.
    #[derive(Default)]
    struct RecordingCache {
        inner: MemoryCache,
        ops: Mutex<Vec<CacheOp>>,
    }

    impl RecordingCache {
        fn ops(&self) -> Vec<CacheOp> {
            self.ops.lock().clone()
        }

        fn clear(&self) {
            self.ops.lock().clear();
        }

        fn mutations(&self) -> Vec<CacheOp> {
            self.ops()
                .into_iter()
                .filter(|op| !matches!(op, CacheOp::Get(_)))
                .collect()
        }
    }

    #[async_trait]
    impl CacheInterface for RecordingCache {
        async fn get_raw(&self, key: &str) -> KeelResult<Option<String>> {
            self.ops.lock().push(CacheOp::Get(key.to_string()));
            self.inner.get_raw(key).await
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> KeelResult<()> {
            self.ops.lock().push(CacheOp::Set(key.to_string(), ttl));
            self.inner.set_raw(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> KeelResult<bool> {
            self.ops.lock().push(CacheOp::Delete(key.to_string()));
            self.inner.delete(key).await
        }

        async fn ping(&self) -> KeelResult<()> {
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    /// Cache whose every call fails, counting attempts.
    #[derive(Default)]
    struct FailingCache {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheInterface for FailingCache {
        async fn get_raw(&self, _key: &str) -> KeelResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(KeelError::Cache("connection refused".to_string()))
        }

        async fn set_raw(&self, _key: &str, _value: &str, _ttl: Duration) -> KeelResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(KeelError::Cache("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> KeelResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(KeelError::Cache("connection refused".to_string()))
        }

        async fn ping(&self) -> KeelResult<()> {
            Err(KeelError::Cache("connection refused".to_string()))
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    /// Cache whose deletes never complete.
    #[derive(Default)]
    struct HangingCache {
        inner: MemoryCache,
    }

    #[async_trait]
    impl CacheInterface for HangingCache {
        async fn get_raw(&self, key: &str) -> KeelResult<Option<String>> {
            self.inner.get_raw(key).await
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> KeelResult<()> {
            self.inner.set_raw(key, value, ttl).await
        }

        async fn delete(&self, _key: &str) -> KeelResult<bool> {
            std::future::pending().await
        }

        async fn ping(&self) -> KeelResult<()> {
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    /// What happens right after the next successful store write.
    enum AfterWrite {
        Cancel(CancelSource),
        /// Holds the write open until the given instant.
        RunUntil(tokio::time::Instant),
    }

    /// In-memory store that counts reads and can be told to fail or stall.
    #[derive(Default)]
    struct ScriptedRepository {
        inner: InMemoryUserRepository,
        find_calls: AtomicUsize,
        fail_writes: AtomicBool,
        stall: AtomicBool,
        after_write: Mutex<Option<AfterWrite>>,
    }

    impl ScriptedRepository {
        fn find_calls(&self) -> usize {
            self.find_calls.load(Ordering::SeqCst)
        }

        fn fail_writes(&self) {
            self.fail_writes.store(true, Ordering::SeqCst);
        }

        fn stall(&self) {
            self.stall.store(true, Ordering::SeqCst);
        }

        async fn gate(&self) -> KeelResult<()> {
            if self.stall.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(())
        }

        fn after_next_write(&self, hook: AfterWrite) {
            *self.after_write.lock() = Some(hook);
        }

        async fn committed(&self) {
            let hook = self.after_write.lock().take();
            match hook {
                Some(AfterWrite::Cancel(source)) => source.cancel(),
                Some(AfterWrite::RunUntil(at)) => tokio::time::sleep_until(at).await,
                None => {}
            }
        }

        fn check_write(&self) -> KeelResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(KeelError::unavailable(
                    "database",
                    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection reset"),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepository for ScriptedRepository {
        async fn create(&self, user: &NewUser) -> KeelResult<User> {
            self.gate().await?;
            self.check_write()?;
            let created = self.inner.create(user).await?;
            self.committed().await;
            Ok(created)
        }

        async fn find_by_id(&self, id: UserId) -> KeelResult<Option<User>> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            self.gate().await?;
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &str) -> KeelResult<Option<User>> {
            self.gate().await?;
            self.inner.find_by_email(email).await
        }

        async fn list(&self, limit: i64, offset: i64) -> KeelResult<Vec<User>> {
            self.gate().await?;
            self.inner.list(limit, offset).await
        }

        async fn count(&self) -> KeelResult<u64> {
            self.gate().await?;
            self.inner.count().await
        }

        async fn update(&self, user: &User) -> KeelResult<User> {
            self.gate().await?;
            self.check_write()?;
            let updated = self.inner.update(user).await?;
            self.committed().await;
            Ok(updated)
        }

        async fn delete(&self, id: UserId) -> KeelResult<bool> {
            self.gate().await?;
            self.check_write()?;
            let deleted = self.inner.delete(id).await?;
            self.committed().await;
            Ok(deleted)
        }
    }

    struct Fixture {
        repo: Arc<ScriptedRepository>,
        cache: Arc<RecordingCache>,
        service: UserServiceImpl,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(ScriptedRepository::default());
        let cache = Arc::new(RecordingCache::default());
        let service = UserServiceImpl::new(repo.clone(), cache.clone(), TTL);
        Fixture {
            repo,
            cache,
            service,
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    async fn create(f: &Fixture, email: &str, name: &str) -> User {
        f.service
            .create_user(&ctx(), CreateUserRequest::new(email, name))
            .await
            .unwrap()
    }

    fn delete_op(key: &str) -> CacheOp {
        CacheOp::Delete(key.to_string())
    }

    // =========================================================================
    // Create
    // =========================================================================

    #[tokio::test]
    async fn test_create_invalidates_only_the_list_key() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;

        assert!(user.id.get() > 0);
        assert_eq!(user.created_at, user.updated_at);
        assert_eq!(f.cache.ops(), vec![delete_op("users:list")]);
        assert!(!f.cache.inner.contains(&cache_keys::user_by_id(user.id)));
    }

    #[tokio::test]
    async fn test_create_trims_input() {
        let f = fixture();
        let user = create(&f, "  ada@example.com ", " Ada ").await;
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_fields_before_the_store() {
        let f = fixture();
        for (email, name) in [("", "Ada"), ("ada@example.com", "  "), ("nope", "Ada")] {
            let err = f
                .service
                .create_user(&ctx(), CreateUserRequest::new(email, name))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Invalid);
        }
        assert!(f.repo.inner.is_empty());
        assert!(f.cache.ops().is_empty());
    }

    #[tokio::test]
    async fn test_create_conflict_leaves_cache_untouched() {
        let f = fixture();
        create(&f, "ada@example.com", "Ada").await;
        f.cache.clear();

        let err = f
            .service
            .create_user(&ctx(), CreateUserRequest::new("ada@example.com", "Other"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(f.cache.ops().is_empty());
    }

    #[tokio::test]
    async fn test_create_store_failure_leaves_cache_untouched() {
        let f = fixture();
        f.repo.fail_writes();
        let err = f
            .service
            .create_user(&ctx(), CreateUserRequest::new("ada@example.com", "Ada"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(f.cache.ops().is_empty());
    }

    // =========================================================================
    // Get
    // =========================================================================

    #[tokio::test]
    async fn test_get_miss_reads_store_and_populates_with_ttl() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.cache.clear();

        let got = f.service.get_user(&ctx(), user.id).await.unwrap();
        assert_eq!(got, user);
        assert_eq!(f.repo.find_calls(), 1);

        let key = cache_keys::user_by_id(user.id);
        assert_eq!(
            f.cache.ops(),
            vec![CacheOp::Get(key.clone()), CacheOp::Set(key, TTL)]
        );
    }

    #[tokio::test]
    async fn test_get_hit_skips_store_and_returns_equal_user() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;

        let first = f.service.get_user(&ctx(), user.id).await.unwrap();
        f.cache.clear();
        let second = f.service.get_user(&ctx(), user.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.repo.find_calls(), 1);
        assert_eq!(
            f.cache.ops(),
            vec![CacheOp::Get(cache_keys::user_by_id(user.id))]
        );
    }

    #[tokio::test]
    async fn test_get_missing_user_is_not_cached() {
        let f = fixture();
        let id = UserId::new(42);

        for _ in 0..2 {
            let err = f.service.get_user(&ctx(), id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert_eq!(f.repo.find_calls(), 2);
        assert!(f.cache.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_get_undecodable_entry_falls_through_and_is_replaced() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        let key = cache_keys::user_by_id(user.id);
        f.cache.inner.set_raw(&key, "{not json", TTL).await.unwrap();

        let got = f.service.get_user(&ctx(), user.id).await.unwrap();
        assert_eq!(got, user);
        assert_eq!(f.repo.find_calls(), 1);

        let cached: Option<User> = f.cache.inner.get(&key).await.unwrap();
        assert_eq!(cached, Some(user));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_entry_expires_after_ttl() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.service.get_user(&ctx(), user.id).await.unwrap();

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        assert_eq!(f.repo.find_calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        assert_eq!(f.repo.find_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_refresh_ttl() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        let key = cache_keys::user_by_id(user.id);
        f.service.get_user(&ctx(), user.id).await.unwrap();

        tokio::time::advance(Duration::from_secs(100)).await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        assert_eq!(f.cache.inner.ttl(&key), Some(TTL - Duration::from_secs(100)));
    }

    // =========================================================================
    // List
    // =========================================================================

    #[tokio::test]
    async fn test_list_is_deterministic_over_fixture() {
        let f = fixture();
        let a = create(&f, "a@example.com", "A").await;
        let b = create(&f, "b@example.com", "B").await;
        let c = create(&f, "c@example.com", "C").await;
        f.cache.clear();

        let first = f.service.list_users(&ctx(), 1, 2).await.unwrap();
        let ids: Vec<_> = first.items.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![c.id, b.id]);
        assert_eq!(first.total, 3);

        let second = f.service.list_users(&ctx(), 2, 2).await.unwrap();
        let ids: Vec<_> = second.items.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![a.id]);
        assert_eq!(second.total, 3);

        let again = f.service.list_users(&ctx(), 1, 2).await.unwrap();
        assert_eq!(again.items, first.items);
        assert!(f.cache.ops().is_empty());
    }

    #[tokio::test]
    async fn test_list_clamps_page_and_size() {
        let f = fixture();
        for i in 0..3 {
            create(&f, &format!("u{i}@example.com"), "U").await;
        }

        let page = f.service.list_users(&ctx(), 0, 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.size, 1);
        assert_eq!(page.len(), 1);

        let page = f.service.list_users(&ctx(), -3, 500).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.size, 100);
        assert_eq!(page.len(), 3);
    }

    #[tokio::test]
    async fn test_list_past_the_end_is_empty_with_total() {
        let f = fixture();
        create(&f, "a@example.com", "A").await;
        let page = f.service.list_users(&ctx(), 5, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total, 1);
    }

    // =========================================================================
    // Update
    // =========================================================================

    #[tokio::test]
    async fn test_update_reads_store_and_invalidates_both_keys_in_order() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        f.cache.clear();

        let updated = f
            .service
            .update_user(&ctx(), user.id, UpdateUserRequest::new("ada@new.io", "Ada L"))
            .await
            .unwrap();

        assert_eq!(updated.email, "ada@new.io");
        assert_eq!(updated.name, "Ada L");
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at > user.updated_at);
        assert_eq!(f.repo.find_calls(), 2);

        let key = cache_keys::user_by_id(user.id);
        assert_eq!(f.cache.ops(), vec![delete_op(&key), delete_op("users:list")]);
        assert!(!f.cache.inner.contains(&key));
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found_without_invalidation() {
        let f = fixture();
        let err = f
            .service
            .update_user(&ctx(), UserId::new(9), UpdateUserRequest::new("a@b.io", "A"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(f.cache.ops().is_empty());
    }

    #[tokio::test]
    async fn test_update_invalid_input_never_reaches_store() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        let err = f
            .service
            .update_user(&ctx(), user.id, UpdateUserRequest::new("ada@example.com", ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(f.repo.find_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_store_failure_skips_invalidation() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        f.cache.clear();
        f.repo.fail_writes();

        let err = f
            .service
            .update_user(&ctx(), user.id, UpdateUserRequest::new("x@y.io", "X"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(f.cache.mutations().is_empty());
        assert!(f.cache.inner.contains(&cache_keys::user_by_id(user.id)));
    }

    #[tokio::test]
    async fn test_update_conflict_skips_invalidation() {
        let f = fixture();
        create(&f, "a@example.com", "A").await;
        let b = create(&f, "b@example.com", "B").await;
        f.cache.clear();

        let err = f
            .service
            .update_user(&ctx(), b.id, UpdateUserRequest::new("a@example.com", "B"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(f.cache.mutations().is_empty());
    }

    // =========================================================================
    // Delete
    // =========================================================================

    #[tokio::test]
    async fn test_delete_invalidates_both_keys_in_order() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.cache.clear();

        f.service.delete_user(&ctx(), user.id).await.unwrap();

        let key = cache_keys::user_by_id(user.id);
        assert_eq!(f.cache.ops(), vec![delete_op(&key), delete_op("users:list")]);
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_not_found_without_invalidation() {
        let f = fixture();
        let err = f
            .service
            .delete_user(&ctx(), UserId::new(77))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(f.cache.ops().is_empty());
    }

    #[tokio::test]
    async fn test_delete_store_failure_skips_invalidation() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.cache.clear();
        f.repo.fail_writes();

        let err = f.service.delete_user(&ctx(), user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(f.cache.ops().is_empty());
    }

    // =========================================================================
    // Get by email
    // =========================================================================

    #[tokio::test]
    async fn test_get_by_email_reads_store_only() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.cache.clear();

        let got = f
            .service
            .get_user_by_email(&ctx(), " ada@example.com ")
            .await
            .unwrap();
        assert_eq!(got, user);
        assert!(f.cache.ops().is_empty());

        let err = f
            .service
            .get_user_by_email(&ctx(), "nobody@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .service
            .get_user_by_email(&ctx(), "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    // =========================================================================
    // Cache outage
    // =========================================================================

    #[tokio::test]
    async fn test_cache_outage_degrades_to_store_only() {
        let repo = Arc::new(ScriptedRepository::default());
        let cache = Arc::new(FailingCache::default());
        let service = UserServiceImpl::new(repo.clone(), cache.clone(), TTL);
        let ctx = ctx();

        let user = service
            .create_user(&ctx, CreateUserRequest::new("ada@example.com", "Ada"))
            .await
            .unwrap();
        assert_eq!(service.get_user(&ctx, user.id).await.unwrap(), user);
        assert_eq!(service.get_user(&ctx, user.id).await.unwrap(), user);
        assert_eq!(repo.find_calls(), 2);

        let updated = service
            .update_user(&ctx, user.id, UpdateUserRequest::new("ada@new.io", "Ada"))
            .await
            .unwrap();
        assert_eq!(updated.email, "ada@new.io");
        service.delete_user(&ctx, user.id).await.unwrap();

        assert!(cache.calls.load(Ordering::SeqCst) > 0);
        assert!(repo.inner.is_empty());
    }

    // =========================================================================
    // Deadlines and cancellation
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapsing_in_store_reports_deadline_exceeded() {
        let f = fixture();
        f.repo.stall();

        let ctx = RequestContext::with_timeout(Duration::from_millis(250));
        let err = f
            .service
            .create_user(&ctx, CreateUserRequest::new("ada@example.com", "Ada"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert!(f.cache.ops().is_empty());
        assert!(f.repo.inner.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_deadline_does_not_populate_cache() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.cache.clear();
        f.repo.stall();

        let ctx = RequestContext::with_timeout(Duration::from_secs(1));
        let err = f.service.get_user(&ctx, user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert!(f.cache.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_context_reports_cancelled() {
        let f = fixture();
        let source = CancelSource::new();
        source.cancel();
        let ctx = RequestContext::background().with_cancel(source.token());

        let err = f
            .service
            .create_user(&ctx, CreateUserRequest::new("ada@example.com", "Ada"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(f.repo.inner.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_after_committed_update_still_invalidates() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        f.cache.clear();

        let source = CancelSource::new();
        f.repo.after_next_write(AfterWrite::Cancel(source.clone()));
        let cancellable = RequestContext::background().with_cancel(source.token());

        let updated = f
            .service
            .update_user(&cancellable, user.id, UpdateUserRequest::new("b@x.io", "B"))
            .await
            .unwrap();
        assert!(source.is_cancelled());

        let key = cache_keys::user_by_id(user.id);
        assert_eq!(f.cache.ops(), vec![delete_op(&key), delete_op("users:list")]);
        assert!(!f.cache.inner.contains(&key));

        let fresh = f.service.get_user(&ctx(), user.id).await.unwrap();
        assert_eq!(fresh, updated);
        assert_eq!(fresh.email, "b@x.io");
    }

    #[tokio::test]
    async fn test_cancel_after_committed_delete_still_invalidates() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        f.cache.clear();

        let source = CancelSource::new();
        f.repo.after_next_write(AfterWrite::Cancel(source.clone()));
        let cancellable = RequestContext::background().with_cancel(source.token());

        f.service.delete_user(&cancellable, user.id).await.unwrap();

        let key = cache_keys::user_by_id(user.id);
        assert_eq!(f.cache.ops(), vec![delete_op(&key), delete_op("users:list")]);
        let err = f.service.get_user(&ctx(), user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_committed_update_still_invalidates() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        f.cache.clear();

        let bounded = RequestContext::with_timeout(Duration::from_secs(1));
        let deadline = bounded.deadline().unwrap();
        f.repo.after_next_write(AfterWrite::RunUntil(deadline));

        let updated = f
            .service
            .update_user(&bounded, user.id, UpdateUserRequest::new("b@x.io", "B"))
            .await
            .unwrap();
        assert_eq!(bounded.remaining(), Some(Duration::ZERO));

        let key = cache_keys::user_by_id(user.id);
        assert_eq!(f.cache.ops(), vec![delete_op(&key), delete_op("users:list")]);
        assert_eq!(f.service.get_user(&ctx(), user.id).await.unwrap(), updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_committed_delete_still_invalidates() {
        let f = fixture();
        let user = create(&f, "ada@example.com", "Ada").await;
        f.service.get_user(&ctx(), user.id).await.unwrap();
        f.cache.clear();

        let bounded = RequestContext::with_timeout(Duration::from_secs(1));
        let deadline = bounded.deadline().unwrap();
        f.repo.after_next_write(AfterWrite::RunUntil(deadline));

        f.service.delete_user(&bounded, user.id).await.unwrap();

        let key = cache_keys::user_by_id(user.id);
        assert_eq!(f.cache.ops(), vec![delete_op(&key), delete_op("users:list")]);
        assert!(!f.cache.inner.contains(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_cache_cannot_stall_a_committed_write() {
        let repo = Arc::new(ScriptedRepository::default());
        let cache = Arc::new(HangingCache::default());
        let service = UserServiceImpl::new(repo.clone(), cache, TTL);

        let started = tokio::time::Instant::now();
        let user = service
            .create_user(&ctx(), CreateUserRequest::new("ada@example.com", "Ada"))
            .await
            .unwrap();
        service.delete_user(&ctx(), user.id).await.unwrap();

        assert!(repo.inner.is_empty());
        let elapsed = started.elapsed();
        assert!(elapsed >= INVALIDATION_TIMEOUT * 3);
        assert!(elapsed < INVALIDATION_TIMEOUT * 4);
    }

    // =========================================================================
    // End to end
    // =========================================================================

    #[tokio::test]
    async fn test_full_lifecycle_scenario() {
        let f = fixture();
        let ctx = ctx();

        let user = f
            .service
            .create_user(&ctx, CreateUserRequest::new("a@x.io", "A"))
            .await
            .unwrap();
        assert_eq!(user.id, UserId::new(1));
        assert_eq!(user.created_at, user.updated_at);
        let key = cache_keys::user_by_id(user.id);

        let first = f.service.get_user(&ctx, user.id).await.unwrap();
        let second = f.service.get_user(&ctx, user.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.repo.find_calls(), 1);

        let updated = f
            .service
            .update_user(&ctx, user.id, UpdateUserRequest::new("b@x.io", "B"))
            .await
            .unwrap();
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at > updated.created_at);
        assert!(!f.cache.inner.contains(&key));

        let after_update = f.service.get_user(&ctx, user.id).await.unwrap();
        assert_eq!(after_update, updated);
        assert_eq!(after_update.email, "b@x.io");
        assert_eq!(f.repo.find_calls(), 3);

        f.service.delete_user(&ctx, user.id).await.unwrap();
        let err = f.service.get_user(&ctx, user.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!f.cache.inner.contains(&key));
    }
}
