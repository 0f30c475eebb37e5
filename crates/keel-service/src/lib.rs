//! # Keel Service
//!
//! The user service: cache-aside orchestration over the record store and
//! the lookaside cache.
//!
//! Reads by id go to the cache first and fall back to the store, populating
//! the cache on the way out. Writes go to the store and then invalidate the
//! affected keys. The cache never has authority, and its failures never
//! reach the caller.

pub mod cache;
pub mod dto;
pub mod r#impl;
pub mod user_service;

pub use cache::*;
pub use dto::*;
pub use r#impl::UserServiceImpl;
pub use user_service::*;
