//! Domain entities.

mod user;

pub use user::{timestamp_now, NewUser, User};
