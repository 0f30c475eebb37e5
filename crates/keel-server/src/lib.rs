//! # Keel Server Library
//!
//! Process wiring for the Keel user service: connects the pools, builds
//! the service graph by constructor injection, and runs the gRPC and admin
//! listeners until shutdown.

pub mod admin;
pub mod app;
pub mod startup;
