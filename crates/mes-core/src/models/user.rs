//! User domain model.
//!
//! [`User`] is the internal record and carries the password hash. It is
//! deliberately not `Serialize`; anything leaving the process goes through
//! [`UserView`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub full_name: String,
    pub role_id: i64,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The outward-safe projection of this user.
    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("role_id", &self.role_id)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Serializable user representation without the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            role_id: user.role_id,
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

/// Administrative create request.
#[derive(Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    /// Raw password (hashed with Argon2id before it reaches the store).
    pub password: String,
    pub full_name: String,
    pub role_id: i64,
    pub email: Option<String>,
}

/// Administrative update request.
#[derive(Clone, Deserialize, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    /// New raw password. `None` or an empty string keeps the stored hash.
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role_id: Option<i64>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub email: Option<Option<String>>,
}

/// Store-facing insert: the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role_id: i64,
    pub email: Option<String>,
}

/// Store-facing partial update.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub role_id: Option<i64>,
    pub email: Option<Option<String>>,
}
