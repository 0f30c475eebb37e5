//! Postgres user repository implementation.

use crate::{traits::UserRepository, DatabasePool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keel_core::{KeelError, KeelResult, NewUser, User, UserId};
use sqlx::FromRow;
use tracing::debug;

/// Postgres user repository.
#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: DatabasePool,
}

impl PgUserRepository {
    /// Creates a repository over `pool`.
    #[must_use]
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a user.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            email: row.email,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Rewrites a unique violation on email into a readable conflict.
fn map_write_error(err: sqlx::Error, email: &str) -> KeelError {
    match KeelError::from(err) {
        KeelError::Conflict(_) => KeelError::conflict(format!("email '{email}' is already registered")),
        other => other,
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &NewUser) -> KeelResult<User> {
        debug!(email = %user.email, "Inserting user");

        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (email, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, created_at, updated_at
            ",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.inner())
        .await
        .map_err(|e| map_write_error(e, &user.email))?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: UserId) -> KeelResult<Option<User>> {
        debug!(user_id = %id, "Finding user by id");

        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, created_at, updated_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> KeelResult<Option<User>> {
        debug!(email = %email, "Finding user by email");

        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, created_at, updated_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(User::from))
    }

    async fn list(&self, limit: i64, offset: i64) -> KeelResult<Vec<User>> {
        debug!(limit, offset, "Listing users");

        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, created_at, updated_at
            FROM users
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.inner())
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn count(&self) -> KeelResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.inner())
            .await?;

        u64::try_from(total).map_err(|_| KeelError::internal(format!("negative row count {total}")))
    }

    async fn update(&self, user: &User) -> KeelResult<User> {
        debug!(user_id = %user.id, "Updating user");

        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE users
            SET email = $1, name = $2, updated_at = $3
            WHERE id = $4
            RETURNING id, email, name, created_at, updated_at
            ",
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.updated_at)
        .bind(user.id)
        .fetch_optional(self.pool.inner())
        .await
        .map_err(|e| map_write_error(e, &user.email))?;

        row.map(User::from)
            .ok_or_else(|| KeelError::not_found("User", user.id))
    }

    async fn delete(&self, id: UserId) -> KeelResult<bool> {
        debug!(user_id = %id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool.inner())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
