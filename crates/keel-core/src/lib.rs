//! # Keel Core
//!
//! Core types, traits, and error definitions for the Keel user service.
//! Every other crate in the workspace speaks in terms of the types defined
//! here: the error taxonomy, typed identifiers, pagination, the per-request
//! context, and the `User` entity.

pub mod context;
pub mod domain;
pub mod error;
pub mod id;
pub mod pagination;
pub mod result;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod validation;

pub use context::*;
pub use domain::*;
pub use error::*;
pub use id::*;
pub use pagination::*;
pub use result::*;
pub use validation::*;
