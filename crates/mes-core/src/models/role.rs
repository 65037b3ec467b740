//! Role domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::permission::Permission;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    /// Permissions granted to this role.
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    /// Permissions granted at creation time. Every id must exist.
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    /// `Some(ids)` replaces the whole permission set (an empty list clears
    /// it), `None` leaves the grants untouched.
    pub permission_ids: Option<Vec<i64>>,
}
