//! User-related DTOs.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 1, message = "email must not be empty"),
        email(message = "email is not a valid address")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
}

impl CreateUserRequest {
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Returns a copy with surrounding whitespace removed.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            email: self.email.trim().to_string(),
            name: self.name.trim().to_string(),
        }
    }
}

/// Request to overwrite a user's email and name.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 1, message = "email must not be empty"),
        email(message = "email is not a valid address")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
}

impl UpdateUserRequest {
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Returns a copy with surrounding whitespace removed.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            email: self.email.trim().to_string(),
            name: self.name.trim().to_string(),
        }
    }
}

/// Lookup of a single user by email.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EmailLookup {
    #[validate(
        length(min = 1, message = "email must not be empty"),
        email(message = "email is not a valid address")
    )]
    pub email: String,
}

impl EmailLookup {
    #[must_use]
    pub fn new(email: &str) -> Self {
        Self {
            email: email.trim().to_string(),
        }
    }
}
