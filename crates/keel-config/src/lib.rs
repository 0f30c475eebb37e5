//! # Keel Config
//!
//! Configuration management for the Keel user service.
//! Configuration is layered from TOML files and `KEEL__` environment
//! variables, then validated before anything is connected.

mod app_config;
mod loader;

pub use app_config::*;
pub use loader::*;
