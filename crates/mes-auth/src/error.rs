//! Authentication error types.

use mes_core::error::{ErrorClass, MesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username and wrong password are deliberately the same error.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("refresh token expired")]
    RefreshTokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("insufficient role")]
    Forbidden,

    #[error("password hashing error: {0}")]
    Hashing(String),

    #[error("token issuance error: {0}")]
    Issuance(String),

    #[error(transparent)]
    Store(#[from] MesError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Outward classification. Hashing and issuance failures are internal
    /// and never reported as a credential problem.
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidRefreshToken
            | AuthError::RefreshTokenExpired
            | AuthError::InvalidToken(_) => ErrorClass::Unauthorized,
            AuthError::Forbidden => ErrorClass::Forbidden,
            AuthError::Store(err) => err.class(),
            AuthError::Hashing(_) | AuthError::Issuance(_) | AuthError::Internal(_) => {
                ErrorClass::Internal
            }
        }
    }
}

impl From<AuthError> for MesError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::InvalidRefreshToken
            | AuthError::RefreshTokenExpired
            | AuthError::InvalidToken(_) => MesError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::Forbidden => MesError::AuthorizationDenied {
                reason: err.to_string(),
            },
            AuthError::Hashing(msg) | AuthError::Issuance(msg) => MesError::Crypto(msg),
            AuthError::Store(err) => err,
            AuthError::Internal(msg) => MesError::Internal(msg),
        }
    }
}
