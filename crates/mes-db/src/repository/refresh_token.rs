//! SurrealDB implementation of [`RefreshTokenRepository`].

use chrono::{DateTime, Utc};
use mes_core::error::MesResult;
use mes_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use mes_core::repository::RefreshTokenRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use crate::error::DbError;
use crate::sequence::next_id;

/// Attempts at deleting a consumed record before treating repeated write
/// conflicts as a lost race.
const CONSUME_ATTEMPTS: u32 = 3;

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RefreshTokenRowWithId {
    record_id: i64,
    user_id: i64,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

fn row_to_token(row: RefreshTokenRow, id: i64) -> RefreshToken {
    RefreshToken {
        id,
        user_id: row.user_id,
        token_hash: row.token_hash,
        expires_at: row.expires_at,
        created_at: row.created_at,
    }
}

impl From<RefreshTokenRowWithId> for RefreshToken {
    fn from(row: RefreshTokenRowWithId) -> Self {
        RefreshToken {
            id: row.record_id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

/// SurrealDB implementation of the RefreshToken repository.
#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// One atomic delete of the record. Of several concurrent callers only
    /// one gets the BEFORE image back; the others see no row or fail with
    /// a write conflict.
    async fn try_consume(&self, id: i64) -> Result<bool, surrealdb::Error> {
        let mut result = self
            .db
            .query("DELETE type::record('refresh_token', $id) RETURN BEFORE")
            .bind(("id", id))
            .await?
            .check()?;

        let rows: Vec<RefreshTokenRow> = result.take(0)?;
        Ok(!rows.is_empty())
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn create(&self, input: CreateRefreshToken) -> MesResult<RefreshToken> {
        let id = next_id(&self.db, "refresh_token").await?;

        let result = self
            .db
            .query(
                "CREATE type::record('refresh_token', $id) SET \
                 user_id = $user_id, \
                 token_hash = $token_hash, \
                 expires_at = $expires_at",
            )
            .bind(("id", id))
            .bind(("user_id", input.user_id))
            .bind(("token_hash", input.token_hash))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("refresh_token", id))?;

        Ok(row_to_token(row, id))
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> MesResult<RefreshToken> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM refresh_token \
                 WHERE token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRowWithId> = result.take(0).map_err(DbError::from)?;
        // The digest itself is a credential; keep it out of error messages.
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("refresh_token", "token_hash=<redacted>"))?;

        Ok(row.into())
    }

    async fn consume(&self, id: i64) -> MesResult<bool> {
        for attempt in 1..=CONSUME_ATTEMPTS {
            match self.try_consume(id).await {
                Ok(consumed) => return Ok(consumed),
                Err(e) if DbError::is_transaction_conflict(&e) => {
                    debug!(id, attempt, "refresh token consume hit a write conflict");
                }
                Err(e) => return Err(DbError::from_statement("refresh_token", e).into()),
            }
        }
        // Every attempt lost to a concurrent writer on the same record, so
        // the token was consumed elsewhere.
        Ok(false)
    }

    async fn delete_by_token_hash(&self, token_hash: &str) -> MesResult<()> {
        self.db
            .query("DELETE refresh_token WHERE token_hash = $token_hash")
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("refresh_token", e))?;

        Ok(())
    }

    async fn delete_for_user(&self, user_id: i64) -> MesResult<u64> {
        let mut result = self
            .db
            .query("DELETE refresh_token WHERE user_id = $user_id RETURN BEFORE")
            .bind(("user_id", user_id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }

    async fn cleanup_expired(&self) -> MesResult<u64> {
        let mut result = self
            .db
            .query("DELETE refresh_token WHERE expires_at <= time::now() RETURN BEFORE")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.len() as u64)
    }
}
