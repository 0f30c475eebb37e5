//! User entity.

use crate::UserId;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Returns the current time at the precision the record store keeps.
#[must_use]
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A user record as persisted by the store.
///
/// The same shape is serialized as the cache snapshot, so every field here
/// must round-trip through JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Refreshes `updated_at`.
    ///
    /// `updated_at` strictly increases on every call, even when the clock
    /// has not advanced past the previous value.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let floor = self.updated_at + Duration::microseconds(1);
        self.updated_at = now.trunc_subsecs(6).max(floor);
    }

    /// Overwrites the mutable fields and refreshes `updated_at`.
    pub fn apply_changes(&mut self, email: String, name: String, now: DateTime<Utc>) {
        self.email = email;
        self.name = name;
        self.touch(now);
    }
}

/// A user that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewUser {
    /// Stamps both timestamps with `now`.
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(6);
        Self {
            email: email.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attaches the id assigned by the store.
    #[must_use]
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            email: self.email,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
