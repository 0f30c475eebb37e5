//! Redis-based cache implementation.

use super::CacheInterface;
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, PoolConfig, Runtime};
use keel_config::RedisConfig;
use keel_core::{KeelError, KeelResult};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default TTL for cached items (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Redis-based cache service.
#[derive(Clone)]
pub struct RedisCacheService {
    /// `None` when Redis is disabled.
    pool: Option<Pool>,
}

impl RedisCacheService {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool: Some(pool) }
    }

    /// Builds a pool from configuration and checks that Redis answers
    /// within `connect_timeout_ms`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the pool cannot be built or the ping fails
    /// or times out.
    pub async fn connect(config: &RedisConfig) -> KeelResult<Self> {
        info!(pool_size = config.pool_size, "Connecting to Redis...");

        let mut pool_config = Config::from_url(config.url.clone());
        pool_config.pool = Some(PoolConfig::new(config.pool_size));
        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KeelError::unavailable("cache", e))?;

        let cache = Self::new(pool);
        match tokio::time::timeout(config.connect_timeout(), cache.ping()).await {
            Ok(Ok(())) => {
                info!("Redis connection established");
                Ok(cache)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Redis ping failed");
                Err(KeelError::unavailable("cache", e))
            }
            Err(elapsed) => {
                warn!(timeout_ms = config.connect_timeout_ms, "Redis ping timed out");
                Err(KeelError::unavailable("cache", elapsed))
            }
        }
    }

    /// Create a no-op cache service (for when Redis is disabled).
    #[must_use]
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    async fn get_conn(&self) -> KeelResult<deadpool_redis::Connection> {
        match &self.pool {
            Some(pool) => pool
                .get()
                .await
                .map_err(|e| KeelError::Cache(format!("failed to get Redis connection: {e}"))),
            None => Err(KeelError::Cache("cache is disabled".to_string())),
        }
    }
}

#[async_trait]
impl CacheInterface for RedisCacheService {
    fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    async fn get_raw(&self, key: &str) -> KeelResult<Option<String>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| KeelError::Cache(format!("failed to get key '{key}': {e}")))?;

        match &value {
            Some(_) => debug!(key, "Cache hit"),
            None => debug!(key, "Cache miss"),
        }

        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> KeelResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;
        let ttl_secs = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| KeelError::Cache(format!("failed to set key '{key}': {e}")))?;

        debug!(key, ttl_secs, "Cached key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> KeelResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let mut conn = self.get_conn().await?;
        let deleted: i64 = conn
            .del(key)
            .await
            .map_err(|e| KeelError::Cache(format!("failed to delete key '{key}': {e}")))?;

        debug!(key, existed = deleted > 0, "Deleted key");
        Ok(deleted > 0)
    }

    async fn ping(&self) -> KeelResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;
        let _pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| KeelError::Cache(format!("ping failed: {e}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheService")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
