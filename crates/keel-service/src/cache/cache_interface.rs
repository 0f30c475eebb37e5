//! Cache interface trait for abstracted caching operations.

use async_trait::async_trait;
use keel_core::KeelResult;
use std::time::Duration;

/// Cache interface for storing and retrieving cached data.
///
/// Values are JSON strings so the trait stays object safe. Typed access
/// goes through [`CacheExt`].
#[async_trait]
pub trait CacheInterface: Send + Sync {
    /// Get a raw JSON value from the cache.
    ///
    /// Returns `None` if the key doesn't exist or has expired. A hit does
    /// not extend the entry's lifetime.
    async fn get_raw(&self, key: &str) -> KeelResult<Option<String>>;

    /// Set a raw JSON value in the cache with a TTL.
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> KeelResult<()>;

    /// Delete a value from the cache.
    ///
    /// Returns `true` if the key existed. Deleting a missing key is not an
    /// error.
    async fn delete(&self, key: &str) -> KeelResult<bool>;

    /// Checks that the backend answers.
    async fn ping(&self) -> KeelResult<()>;

    /// Check if caching is enabled.
    fn is_enabled(&self) -> bool;
}

/// Typed access on top of [`CacheInterface`].
#[async_trait]
pub trait CacheExt: CacheInterface {
    /// Get a typed value from the cache.
    async fn get<T: serde::de::DeserializeOwned + Send>(&self, key: &str) -> KeelResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Set a typed value in the cache.
    async fn set<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> KeelResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, &json, ttl).await
    }
}

impl<T: CacheInterface + ?Sized> CacheExt for T {}
