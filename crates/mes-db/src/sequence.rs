//! Integer id allocation.
//!
//! Every table draws ids from its own counter record in `_sequence`, so
//! the first role created in a fresh database is `role:1`.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SequenceRow {
    value: i64,
}

/// Allocate the next id for `table`. Ids are never reused.
pub(crate) async fn next_id<C: Connection>(db: &Surreal<C>, table: &str) -> Result<i64, DbError> {
    let result = db
        .query("UPSERT type::record('_sequence', $table) SET value += 1")
        .bind(("table", table.to_string()))
        .await?;

    let mut result = result
        .check()
        .map_err(|e| DbError::Query(e.to_string()))?;

    let rows: Vec<SequenceRow> = result.take(0)?;
    rows.into_iter()
        .next()
        .map(|row| row.value)
        .ok_or_else(|| DbError::Query(format!("sequence for {table} returned no value")))
}
