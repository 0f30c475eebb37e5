//! # Keel gRPC
//!
//! gRPC surface of the Keel user service.
//!
//! Every unary call goes through the [`InterceptorChain`] before it reaches
//! the user service:
//!
//! ```text
//! logging → metrics → recovery → handler → UserService
//! ```

pub mod deadline;
pub mod interceptors;
pub mod proto;
pub mod server;
pub mod services;
pub mod status;

pub use interceptors::InterceptorChain;
pub use server::*;
pub use services::*;
pub use status::to_status;
