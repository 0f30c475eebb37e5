//! Lookaside cache for the service layer.
//!
//! [`CacheInterface`] is the seam. [`RedisCacheService`] is the production
//! backend, [`MemoryCache`] keeps entries in process on the tokio clock.

mod cache_interface;
pub mod cache_keys;
mod memory_cache;
mod redis_cache;

pub use cache_interface::{CacheExt, CacheInterface};
pub use memory_cache::MemoryCache;
pub use redis_cache::{RedisCacheService, DEFAULT_TTL};
