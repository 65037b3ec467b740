//! SurrealDB implementation of [`UserRepository`].
//!
//! The repository never sees plaintext passwords: hashing happens in the
//! auth layer before [`NewUser`] / [`UserChanges`] are built.

use chrono::{DateTime, Utc};
use mes_core::error::MesResult;
use mes_core::models::user::{NewUser, User, UserChanges};
use mes_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;
use crate::sequence::next_id;

/// DB-side row struct for queries where the id is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    username: String,
    password_hash: String,
    full_name: String,
    role_id: i64,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record id via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: i64,
    username: String,
    password_hash: String,
    full_name: String,
    role_id: i64,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, id: i64) -> User {
        User {
            id,
            username: self.username,
            password_hash: self.password_hash,
            full_name: self.full_name,
            role_id: self.role_id,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

impl From<UserRowWithId> for User {
    fn from(row: UserRowWithId) -> Self {
        User {
            id: row.record_id,
            username: row.username,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role_id: row.role_id,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: NewUser) -> MesResult<User> {
        let id = next_id(&self.db, "user").await?;

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, \
                 password_hash = $password_hash, \
                 full_name = $full_name, \
                 role_id = $role_id, \
                 email = $email",
            )
            .bind(("id", id))
            .bind(("username", input.username))
            .bind(("password_hash", input.password_hash))
            .bind(("full_name", input.full_name))
            .bind(("role_id", input.role_id))
            .bind(("email", input.email))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id))?;

        Ok(row.into_user(id))
    }

    async fn get_by_id(&self, id: i64) -> MesResult<User> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id))?;

        Ok(row.into_user(id))
    }

    async fn get_by_username(&self, username: &str) -> MesResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE username = $username",
            )
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", format!("username={username}")))?;

        Ok(row.into())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> MesResult<User> {
        let mut sets = Vec::new();
        if changes.username.is_some() {
            sets.push("username = $username");
        }
        if changes.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if changes.full_name.is_some() {
            sets.push("full_name = $full_name");
        }
        if changes.role_id.is_some() {
            sets.push("role_id = $role_id");
        }
        if changes.email.is_some() {
            sets.push("email = $email");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id));

        if let Some(username) = changes.username {
            builder = builder.bind(("username", username));
        }
        if let Some(password_hash) = changes.password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(full_name) = changes.full_name {
            builder = builder.bind(("full_name", full_name));
        }
        if let Some(role_id) = changes.role_id {
            builder = builder.bind(("role_id", role_id));
        }
        if let Some(email) = changes.email {
            builder = builder.bind(("email", email));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("user", id))?;

        Ok(row.into_user(id))
    }

    async fn delete(&self, id: i64) -> MesResult<()> {
        let mut result = self
            .db
            .query("DELETE type::record('user', $id) RETURN BEFORE")
            .bind(("id", id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("user", id).into());
        }

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> MesResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY record_id ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows.into_iter().map(User::from).collect();

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
