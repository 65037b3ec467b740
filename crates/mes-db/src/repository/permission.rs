//! SurrealDB implementation of [`PermissionRepository`].

use chrono::{DateTime, Utc};
use mes_core::error::MesResult;
use mes_core::models::permission::{CreatePermission, Permission, UpdatePermission};
use mes_core::repository::{PaginatedResult, Pagination, PermissionRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;
use crate::sequence::next_id;

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    code: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
pub(crate) struct PermissionRowWithId {
    record_id: i64,
    code: String,
    name: String,
    description: Option<String>,
    category: Option<String>,
    created_at: DateTime<Utc>,
}

impl PermissionRow {
    fn into_permission(self, id: i64) -> Permission {
        Permission {
            id,
            code: self.code,
            name: self.name,
            description: self.description,
            category: self.category,
            created_at: self.created_at,
        }
    }
}

impl From<PermissionRowWithId> for Permission {
    fn from(row: PermissionRowWithId) -> Self {
        Permission {
            id: row.record_id,
            code: row.code,
            name: row.name,
            description: row.description,
            category: row.category,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> MesResult<Permission> {
        let id = next_id(&self.db, "permission").await?;

        let result = self
            .db
            .query(
                "CREATE type::record('permission', $id) SET \
                 code = $code, name = $name, \
                 description = $description, category = $category",
            )
            .bind(("id", id))
            .bind(("code", input.code))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("category", input.category))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("permission", e))?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", id))?;

        Ok(row.into_permission(id))
    }

    async fn get_by_id(&self, id: i64) -> MesResult<Permission> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('permission', $id)")
            .bind(("id", id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", id))?;

        Ok(row.into_permission(id))
    }

    async fn get_by_code(&self, code: &str) -> MesResult<Permission> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE code = $code",
            )
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", format!("code={code}")))?;

        Ok(row.into())
    }

    async fn update(&self, id: i64, input: UpdatePermission) -> MesResult<Permission> {
        let mut sets = Vec::new();
        if input.code.is_some() {
            sets.push("code = $code");
        }
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.category.is_some() {
            sets.push("category = $category");
        }

        if sets.is_empty() {
            return self.get_by_id(id).await;
        }

        let query = format!(
            "UPDATE type::record('permission', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id));

        if let Some(code) = input.code {
            builder = builder.bind(("code", code));
        }
        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(category) = input.category {
            builder = builder.bind(("category", category));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("permission", e))?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("permission", id))?;

        Ok(row.into_permission(id))
    }

    async fn delete(&self, id: i64) -> MesResult<()> {
        // Delete associated grants edges first, then the permission record.
        let mut result = self
            .db
            .query(
                "DELETE grants WHERE out = type::record('permission', $id); \
                 DELETE type::record('permission', $id) RETURN BEFORE;",
            )
            .bind(("id", id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(1).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::not_found("permission", id).into());
        }

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> MesResult<PaginatedResult<Permission>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM permission GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 ORDER BY record_id ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows.into_iter().map(Permission::from).collect();

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
