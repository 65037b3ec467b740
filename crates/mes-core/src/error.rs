//! Error types for the MES RBAC backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MesError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type MesResult<T> = Result<T, MesError>;

impl MesError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Outward classification of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::AlreadyExists { .. } => ErrorClass::Conflict,
            Self::AuthenticationFailed { .. } => ErrorClass::Unauthorized,
            Self::AuthorizationDenied { .. } => ErrorClass::Forbidden,
            Self::Validation { .. } => ErrorClass::BadRequest,
            Self::Database(_) | Self::Crypto(_) | Self::Internal(_) => ErrorClass::Internal,
        }
    }
}

/// The class of signal a transport layer sends back for a failure.
///
/// Store and cryptography failures collapse into [`ErrorClass::Internal`]
/// and carry only [`ErrorClass::public_message`] outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    BadRequest,
    Internal,
}

impl ErrorClass {
    /// HTTP status code conventionally used for this class.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::BadRequest => 400,
            Self::Internal => 500,
        }
    }

    pub fn public_message(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Conflict => "already exists",
            Self::BadRequest => "bad request",
            Self::Internal => "internal error",
        }
    }
}
