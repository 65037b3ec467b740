//! SurrealDB implementation of [`RoleRepository`].
//!
//! Permissions are attached through `grants` graph edges
//! (`role -> grants -> permission`). The edge set of a role is always
//! rewritten as a whole inside one transaction.

use chrono::{DateTime, Utc};
use mes_core::error::MesResult;
use mes_core::models::permission::Permission;
use mes_core::models::role::{CreateRole, Role, UpdateRole};
use mes_core::repository::{PaginatedResult, Pagination, RoleRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::permission::PermissionRowWithId;
use crate::error::DbError;
use crate::sequence::next_id;

#[derive(Debug, SurrealValue)]
struct RoleRow {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RoleRowWithId {
    record_id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self, id: i64, permissions: Vec<Permission>) -> Role {
        Role {
            id,
            name: self.name,
            permissions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Sort and deduplicate permission ids; reject non-positive ids up front.
fn normalize_ids(ids: &[i64]) -> Result<Vec<i64>, DbError> {
    if let Some(bad) = ids.iter().find(|id| **id <= 0) {
        return Err(DbError::not_found("permission", bad));
    }
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// One `RELATE` statement per permission. Ids are plain integers so they
/// can be inlined into the record literals.
fn grant_statements(role_id: i64, permission_ids: &[i64]) -> String {
    permission_ids
        .iter()
        .map(|pid| format!("RELATE role:{role_id} -> grants -> permission:{pid};"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_row(&self, id: i64) -> Result<Option<RoleRow>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('role', $id)")
            .bind(("id", id))
            .await?;
        let rows: Vec<RoleRow> = result.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Fail with `NotFound` naming the first id that has no permission record.
    async fn ensure_permissions_exist(&self, ids: &[i64]) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }

        let targets = ids
            .iter()
            .map(|id| format!("permission:{id}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut result = self
            .db
            .query(format!("SELECT VALUE meta::id(id) FROM [{targets}]"))
            .await?;
        let found: Vec<i64> = result.take(0)?;

        match ids.iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(DbError::not_found("permission", missing)),
            None => Ok(()),
        }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: CreateRole) -> MesResult<Role> {
        let permission_ids = normalize_ids(&input.permission_ids)?;
        self.ensure_permissions_exist(&permission_ids).await?;

        let id = next_id(&self.db, "role").await?;
        let query = format!(
            "BEGIN TRANSACTION;\n\
             CREATE type::record('role', $id) SET name = $name;\n\
             {}\n\
             COMMIT TRANSACTION;",
            grant_statements(id, &permission_ids)
        );

        self.db
            .query(query)
            .bind(("id", id))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: i64) -> MesResult<Role> {
        let row = self
            .fetch_row(id)
            .await?
            .ok_or_else(|| DbError::not_found("role", id))?;
        let permissions = self.get_permissions(id).await?;

        Ok(row.into_role(id, permissions))
    }

    async fn get_by_name(&self, name: &str) -> MesResult<Role> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE name = $name",
            )
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("role", format!("name={name}")))?;
        let permissions = self.get_permissions(row.record_id).await?;

        Ok(Role {
            id: row.record_id,
            name: row.name,
            permissions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn update(&self, id: i64, input: UpdateRole) -> MesResult<Role> {
        if let Some(name) = input.name {
            let mut result = self
                .db
                .query(
                    "UPDATE type::record('role', $id) SET \
                     name = $name, updated_at = time::now()",
                )
                .bind(("id", id))
                .bind(("name", name))
                .await
                .map_err(DbError::from)?
                .check()
                .map_err(|e| DbError::from_statement("role", e))?;

            let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
            if rows.is_empty() {
                return Err(DbError::not_found("role", id).into());
            }
        }

        if let Some(permission_ids) = input.permission_ids {
            self.replace_permissions(id, &permission_ids).await?;
        }

        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> MesResult<()> {
        // Delete associated grants edges first, then the role record.
        let mut result = self
            .db
            .query(
                "DELETE grants WHERE in = type::record('role', $id); \
                 DELETE type::record('role', $id) RETURN BEFORE;",
            )
            .bind(("id", id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("role", id).into());
        }

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> MesResult<PaginatedResult<Role>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM role GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 ORDER BY record_id ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let permissions = self.get_permissions(row.record_id).await?;
            items.push(Role {
                id: row.record_id,
                name: row.name,
                permissions,
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        }

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn replace_permissions(&self, role_id: i64, permission_ids: &[i64]) -> MesResult<()> {
        if self.fetch_row(role_id).await?.is_none() {
            return Err(DbError::not_found("role", role_id).into());
        }

        let permission_ids = normalize_ids(permission_ids)?;
        self.ensure_permissions_exist(&permission_ids).await?;

        let query = format!(
            "BEGIN TRANSACTION;\n\
             DELETE grants WHERE in = type::record('role', $id);\n\
             {}\n\
             UPDATE type::record('role', $id) SET updated_at = time::now();\n\
             COMMIT TRANSACTION;",
            grant_statements(role_id, &permission_ids)
        );

        self.db
            .query(query)
            .bind(("id", role_id))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("role", e))?;

        Ok(())
    }

    async fn get_permissions(&self, role_id: i64) -> MesResult<Vec<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE id IN (\
                     SELECT VALUE out FROM grants \
                     WHERE in = type::record('role', $role_id)\
                 ) \
                 ORDER BY record_id ASC",
            )
            .bind(("role_id", role_id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }
}
