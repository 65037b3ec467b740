//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Lookups of a missing record fail
//! with [`MesError::NotFound`](crate::error::MesError::NotFound); unique
//! constraint violations fail with
//! [`MesError::AlreadyExists`](crate::error::MesError::AlreadyExists).

use crate::error::MesResult;
use crate::models::{
    permission::{CreatePermission, Permission, UpdatePermission},
    refresh_token::{CreateRefreshToken, RefreshToken},
    role::{CreateRole, Role, UpdateRole},
    user::{NewUser, User, UserChanges},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: NewUser) -> impl Future<Output = MesResult<User>> + Send;
    fn get_by_id(&self, id: i64) -> impl Future<Output = MesResult<User>> + Send;
    fn get_by_username(&self, username: &str) -> impl Future<Output = MesResult<User>> + Send;
    fn update(
        &self,
        id: i64,
        changes: UserChanges,
    ) -> impl Future<Output = MesResult<User>> + Send;
    fn delete(&self, id: i64) -> impl Future<Output = MesResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = MesResult<PaginatedResult<User>>> + Send;
}

pub trait RefreshTokenRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRefreshToken,
    ) -> impl Future<Output = MesResult<RefreshToken>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = MesResult<RefreshToken>> + Send;
    /// Atomically delete the record and report whether this call was the
    /// one that removed it. Concurrent callers racing on the same record
    /// see `true` at most once.
    fn consume(&self, id: i64) -> impl Future<Output = MesResult<bool>> + Send;
    /// Delete by digest. Deleting a missing record is a no-op.
    fn delete_by_token_hash(&self, token_hash: &str)
    -> impl Future<Output = MesResult<()>> + Send;
    /// Revoke every refresh token of a user (e.g. on account deletion).
    fn delete_for_user(&self, user_id: i64) -> impl Future<Output = MesResult<u64>> + Send;
    /// Remove all expired records.
    fn cleanup_expired(&self) -> impl Future<Output = MesResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Role / permission store
// ---------------------------------------------------------------------------

pub trait RoleRepository: Send + Sync {
    /// Create a role and grant `permission_ids` in one transaction.
    fn create(&self, input: CreateRole) -> impl Future<Output = MesResult<Role>> + Send;
    fn get_by_id(&self, id: i64) -> impl Future<Output = MesResult<Role>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = MesResult<Role>> + Send;
    fn update(&self, id: i64, input: UpdateRole) -> impl Future<Output = MesResult<Role>> + Send;
    fn delete(&self, id: i64) -> impl Future<Output = MesResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = MesResult<PaginatedResult<Role>>> + Send;

    /// Replace the role's permission set: delete every grant, then insert
    /// one per id. An empty slice clears all grants.
    fn replace_permissions(
        &self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> impl Future<Output = MesResult<()>> + Send;

    /// Get all permissions granted to a role.
    fn get_permissions(&self, role_id: i64)
    -> impl Future<Output = MesResult<Vec<Permission>>> + Send;
}

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = MesResult<Permission>> + Send;
    fn get_by_id(&self, id: i64) -> impl Future<Output = MesResult<Permission>> + Send;
    fn get_by_code(&self, code: &str) -> impl Future<Output = MesResult<Permission>> + Send;
    fn update(
        &self,
        id: i64,
        input: UpdatePermission,
    ) -> impl Future<Output = MesResult<Permission>> + Send;
    fn delete(&self, id: i64) -> impl Future<Output = MesResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = MesResult<PaginatedResult<Permission>>> + Send;
}
