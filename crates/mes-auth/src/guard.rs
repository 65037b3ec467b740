//! Bearer-token extraction and role-based access checks for the transport
//! layer.

use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::token::AuthClaims;

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> AuthResult<&str> {
    let header = header.ok_or_else(|| AuthError::InvalidToken("no token".into()))?;
    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| AuthError::InvalidToken("invalid token format".into()))?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidToken("no token".into()));
    }
    Ok(token)
}

/// Admits only tokens whose role is in the allowed set.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    allowed: Vec<String>,
}

impl RoleGuard {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn check(&self, claims: &AuthClaims) -> AuthResult<()> {
        if self.allowed.iter().any(|role| *role == claims.role) {
            return Ok(());
        }
        debug!(user_id = claims.id, role = %claims.role, "role not allowed");
        Err(AuthError::Forbidden)
    }
}
