//! In-memory user repository.
//!
//! Behaves like the Postgres store: ids are assigned monotonically and never
//! reused, email is unique, and listing is newest first with ties broken by
//! id. Used by tests and by store-less local runs.

use crate::traits::UserRepository;
use async_trait::async_trait;
use keel_core::{KeelError, KeelResult, NewUser, User, UserId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    users: BTreeMap<UserId, User>,
}

/// In-memory user repository.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    state: Mutex<State>,
}

impl InMemoryUserRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored users without going through the trait.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Returns true if no users are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn email_taken(state: &State, email: &str, except: Option<UserId>) -> bool {
    state
        .users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &NewUser) -> KeelResult<User> {
        let mut state = self.state.lock();
        if email_taken(&state, &user.email, None) {
            return Err(KeelError::conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }

        state.next_id += 1;
        let created = user.clone().into_user(UserId::new(state.next_id));
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: UserId) -> KeelResult<Option<User>> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> KeelResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> KeelResult<Vec<User>> {
        let mut users: Vec<User> = self.state.lock().users.values().cloned().collect();
        users.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> KeelResult<u64> {
        Ok(self.state.lock().users.len() as u64)
    }

    async fn update(&self, user: &User) -> KeelResult<User> {
        let mut state = self.state.lock();
        if !state.users.contains_key(&user.id) {
            return Err(KeelError::not_found("User", user.id));
        }
        if email_taken(&state, &user.email, Some(user.id)) {
            return Err(KeelError::conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }

        let stored = state
            .users
            .get_mut(&user.id)
            .ok_or_else(|| KeelError::not_found("User", user.id))?;
        stored.email.clone_from(&user.email);
        stored.name.clone_from(&user.name);
        stored.updated_at = user.updated_at;
        Ok(stored.clone())
    }

    async fn delete(&self, id: UserId) -> KeelResult<bool> {
        Ok(self.state.lock().users.remove(&id).is_some())
    }
}
