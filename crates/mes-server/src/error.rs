//! Error types for the server binary.

use mes_auth::AuthError;
use mes_core::error::MesError;
use mes_db::DbError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid or inconsistent settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configuration sources could not be read or deserialized.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] MesError),
}

impl ServerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }
}
