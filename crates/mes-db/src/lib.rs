//! MES Database: SurrealDB connection management, schema migrations and
//! repository implementations of the `mes-core` traits.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Per-table integer id sequences
//! - Error types ([`DbError`])
//! - Repositories ([`repository`])

mod connection;
mod error;
mod schema;
mod sequence;

pub mod repository;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
