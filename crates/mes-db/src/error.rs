//! Database-specific error types and conversions.

use mes_core::error::MesError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },
}

impl DbError {
    /// Classify a failed statement. Unique index violations become
    /// [`DbError::AlreadyExists`] so callers can surface a conflict.
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::AlreadyExists {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }

    /// Whether a statement lost an optimistic write race and may be retried.
    pub(crate) fn is_transaction_conflict(err: &surrealdb::Error) -> bool {
        is_conflict_message(&err.to_string())
    }

    pub(crate) fn not_found(entity: &str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

fn is_conflict_message(message: &str) -> bool {
    message.contains("Transaction conflict") || message.contains("retry the transaction")
}

impl From<DbError> for MesError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => MesError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => MesError::AlreadyExists { entity },
            other => MesError::Database(other.to_string()),
        }
    }
}
