//! Mapping from a user's role id to the role name embedded in access
//! tokens.

use std::collections::BTreeMap;

use mes_core::models::role::Role;
use mes_core::repository::RoleRepository;

use crate::error::AuthResult;

/// Name used for any role id without an entry.
pub const FALLBACK_ROLE: &str = "user";

/// Resolves the role name placed in the `role` claim.
pub trait RoleNameResolver: Send + Sync {
    fn role_name(&self, role_id: i64) -> impl Future<Output = AuthResult<String>> + Send;
}

/// Fixed id → name table. The default matches the roles seeded into a
/// fresh database.
#[derive(Debug, Clone)]
pub struct StaticRoleNames {
    names: BTreeMap<i64, String>,
}

impl Default for StaticRoleNames {
    fn default() -> Self {
        Self::new([(1, "admin"), (2, "operator"), (3, "viewer")])
    }
}

/// A role whose stored name differs from the static table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNameDivergence {
    pub role_id: i64,
    /// Name the static table puts into tokens.
    pub static_name: String,
    /// Name stored for the role, `None` if no such role exists.
    pub stored_name: Option<String>,
}

impl StaticRoleNames {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(id, name)| (id, name.into()))
                .collect(),
        }
    }

    pub fn lookup(&self, role_id: i64) -> &str {
        self.names
            .get(&role_id)
            .map(String::as_str)
            .unwrap_or(FALLBACK_ROLE)
    }

    /// Entries of the table that disagree with the given stored roles.
    pub fn divergences(&self, stored: &[Role]) -> Vec<RoleNameDivergence> {
        self.names
            .iter()
            .filter_map(|(id, name)| {
                let stored_name = stored.iter().find(|r| r.id == *id).map(|r| r.name.clone());
                match &stored_name {
                    Some(stored) if stored == name => None,
                    _ => Some(RoleNameDivergence {
                        role_id: *id,
                        static_name: name.clone(),
                        stored_name,
                    }),
                }
            })
            .collect()
    }
}

impl RoleNameResolver for StaticRoleNames {
    async fn role_name(&self, role_id: i64) -> AuthResult<String> {
        Ok(self.lookup(role_id).to_string())
    }
}

/// Live lookup of the stored role name. A role id with no record falls
/// back to [`FALLBACK_ROLE`]; any other store failure propagates.
#[derive(Clone)]
pub struct StoreRoleNames<R: RoleRepository> {
    roles: R,
}

impl<R: RoleRepository> StoreRoleNames<R> {
    pub fn new(roles: R) -> Self {
        Self { roles }
    }
}

impl<R: RoleRepository> RoleNameResolver for StoreRoleNames<R> {
    async fn role_name(&self, role_id: i64) -> AuthResult<String> {
        match self.roles.get_by_id(role_id).await {
            Ok(role) => Ok(role.name),
            Err(e) if e.is_not_found() => Ok(FALLBACK_ROLE.to_string()),
            Err(e) => Err(e.into()),
        }
    }
}
