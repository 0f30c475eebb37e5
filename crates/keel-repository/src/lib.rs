//! # Keel Repository
//!
//! The record store behind the user service.
//!
//! ```text
//! UserService
//!   ↓  Arc<dyn UserRepository>
//! PgUserRepository  (Postgres / SQLx)
//! InMemoryUserRepository  (tests, local runs)
//! ```

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod traits;

pub use memory::InMemoryUserRepository;
pub use pool::*;
pub use postgres::PgUserRepository;
pub use traits::*;
