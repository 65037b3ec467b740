//! Integration tests for Role and Permission repositories, including the
//! `grants` edges between them.

use mes_core::error::MesError;
use mes_core::models::permission::{CreatePermission, UpdatePermission};
use mes_core::models::role::{CreateRole, UpdateRole};
use mes_core::repository::{Pagination, PermissionRepository, RoleRepository};
use mes_db::repository::{SurrealPermissionRepository, SurrealRoleRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> (SurrealRoleRepository<Db>, SurrealPermissionRepository<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    mes_db::run_migrations(&db).await.unwrap();
    (
        SurrealRoleRepository::new(db.clone()),
        SurrealPermissionRepository::new(db),
    )
}

fn permission(code: &str) -> CreatePermission {
    CreatePermission {
        code: code.into(),
        name: code.replace(':', " "),
        description: None,
        category: Some("production".into()),
    }
}

fn ids(perms: &[mes_core::models::permission::Permission]) -> Vec<i64> {
    perms.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn permission_crud() {
    let (_, perms) = setup().await;

    let created = perms.create(permission("order:read")).await.unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.code, "order:read");
    assert_eq!(created.category.as_deref(), Some("production"));

    let by_code = perms.get_by_code("order:read").await.unwrap();
    assert_eq!(by_code, created);

    let updated = perms
        .update(
            created.id,
            UpdatePermission {
                name: Some("Read orders".into()),
                description: Some(Some("View work orders".into())),
                category: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Read orders");
    assert_eq!(updated.description.as_deref(), Some("View work orders"));
    assert!(updated.category.is_none());
    assert_eq!(updated.code, "order:read");

    perms.delete(created.id).await.unwrap();
    assert!(perms.get_by_id(created.id).await.unwrap_err().is_not_found());
    assert!(perms.delete(created.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn duplicate_permission_code_is_conflict() {
    let (_, perms) = setup().await;

    perms.create(permission("order:read")).await.unwrap();
    let err = perms.create(permission("order:read")).await.unwrap_err();
    assert!(
        matches!(err, MesError::AlreadyExists { .. }),
        "expected AlreadyExists, got: {err:?}"
    );
}

#[tokio::test]
async fn permission_list_is_paginated() {
    let (_, perms) = setup().await;
    for code in ["a:1", "a:2", "a:3"] {
        perms.create(permission(code)).await.unwrap();
    }

    let page = perms
        .list(Pagination {
            offset: 2,
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].code, "a:3");
}

#[tokio::test]
async fn create_role_with_permissions() {
    let (roles, perms) = setup().await;
    let read = perms.create(permission("order:read")).await.unwrap();
    let write = perms.create(permission("order:write")).await.unwrap();

    let role = roles
        .create(CreateRole {
            name: "operator".into(),
            permission_ids: vec![write.id, read.id, read.id],
        })
        .await
        .unwrap();

    assert_eq!(role.id, 1);
    assert_eq!(role.name, "operator");
    assert_eq!(ids(&role.permissions), [read.id, write.id]);

    let by_name = roles.get_by_name("operator").await.unwrap();
    assert_eq!(by_name.id, role.id);
    assert_eq!(ids(&by_name.permissions), [read.id, write.id]);
}

#[tokio::test]
async fn seeded_role_ids_follow_creation_order() {
    let (roles, _) = setup().await;

    for (expected, name) in [(1, "admin"), (2, "operator"), (3, "viewer")] {
        let role = roles
            .create(CreateRole {
                name: name.into(),
                permission_ids: vec![],
            })
            .await
            .unwrap();
        assert_eq!(role.id, expected);
    }
}

#[tokio::test]
async fn duplicate_role_name_is_conflict() {
    let (roles, _) = setup().await;

    roles
        .create(CreateRole {
            name: "admin".into(),
            permission_ids: vec![],
        })
        .await
        .unwrap();
    let err = roles
        .create(CreateRole {
            name: "admin".into(),
            permission_ids: vec![],
        })
        .await
        .unwrap_err();
    assert!(
        matches!(err, MesError::AlreadyExists { .. }),
        "expected AlreadyExists, got: {err:?}"
    );
}

#[tokio::test]
async fn rename_to_existing_name_is_conflict() {
    let (roles, _) = setup().await;
    for name in ["admin", "viewer"] {
        roles
            .create(CreateRole {
                name: name.into(),
                permission_ids: vec![],
            })
            .await
            .unwrap();
    }

    let err = roles
        .update(
            2,
            UpdateRole {
                name: Some("admin".into()),
                permission_ids: None,
            },
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, MesError::AlreadyExists { .. }),
        "expected AlreadyExists, got: {err:?}"
    );
}

#[tokio::test]
async fn create_role_with_unknown_permission_creates_nothing() {
    let (roles, perms) = setup().await;
    let read = perms.create(permission("order:read")).await.unwrap();

    let err = roles
        .create(CreateRole {
            name: "operator".into(),
            permission_ids: vec![read.id, 99],
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got: {err:?}");
    assert!(roles.get_by_name("operator").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn replace_permissions_rewrites_the_set() {
    let (roles, perms) = setup().await;
    let a = perms.create(permission("a:1")).await.unwrap();
    let b = perms.create(permission("b:1")).await.unwrap();
    let c = perms.create(permission("c:1")).await.unwrap();

    let role = roles
        .create(CreateRole {
            name: "operator".into(),
            permission_ids: vec![a.id, b.id],
        })
        .await
        .unwrap();

    roles.replace_permissions(role.id, &[b.id, c.id]).await.unwrap();
    let granted = roles.get_permissions(role.id).await.unwrap();
    assert_eq!(ids(&granted), [b.id, c.id]);

    roles.replace_permissions(role.id, &[]).await.unwrap();
    assert!(roles.get_permissions(role.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn replace_with_missing_permission_keeps_old_set() {
    let (roles, perms) = setup().await;
    let a = perms.create(permission("a:1")).await.unwrap();

    let role = roles
        .create(CreateRole {
            name: "operator".into(),
            permission_ids: vec![a.id],
        })
        .await
        .unwrap();

    let err = roles.replace_permissions(role.id, &[77]).await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got: {err:?}");

    let err = roles.replace_permissions(role.id, &[0]).await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got: {err:?}");

    assert_eq!(ids(&roles.get_permissions(role.id).await.unwrap()), [a.id]);
}

#[tokio::test]
async fn replace_on_missing_role_is_not_found() {
    let (roles, _) = setup().await;

    let err = roles.replace_permissions(5, &[]).await.unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got: {err:?}");
}

#[tokio::test]
async fn update_without_permission_ids_keeps_grants() {
    let (roles, perms) = setup().await;
    let a = perms.create(permission("a:1")).await.unwrap();
    let role = roles
        .create(CreateRole {
            name: "operator".into(),
            permission_ids: vec![a.id],
        })
        .await
        .unwrap();

    let renamed = roles
        .update(
            role.id,
            UpdateRole {
                name: Some("line-operator".into()),
                permission_ids: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "line-operator");
    assert_eq!(ids(&renamed.permissions), [a.id]);

    let cleared = roles
        .update(
            role.id,
            UpdateRole {
                name: None,
                permission_ids: Some(vec![]),
            },
        )
        .await
        .unwrap();
    assert!(cleared.permissions.is_empty());
}

#[tokio::test]
async fn deleting_permission_removes_grant() {
    let (roles, perms) = setup().await;
    let a = perms.create(permission("a:1")).await.unwrap();
    let b = perms.create(permission("b:1")).await.unwrap();
    let role = roles
        .create(CreateRole {
            name: "operator".into(),
            permission_ids: vec![a.id, b.id],
        })
        .await
        .unwrap();

    perms.delete(a.id).await.unwrap();
    assert_eq!(ids(&roles.get_permissions(role.id).await.unwrap()), [b.id]);
}

#[tokio::test]
async fn delete_role() {
    let (roles, perms) = setup().await;
    let a = perms.create(permission("a:1")).await.unwrap();
    let role = roles
        .create(CreateRole {
            name: "operator".into(),
            permission_ids: vec![a.id],
        })
        .await
        .unwrap();

    roles.delete(role.id).await.unwrap();
    assert!(roles.get_by_id(role.id).await.unwrap_err().is_not_found());
    assert!(roles.delete(role.id).await.unwrap_err().is_not_found());

    // The permission itself survives.
    assert!(perms.get_by_id(a.id).await.is_ok());
}

#[tokio::test]
async fn role_list_includes_permissions() {
    let (roles, perms) = setup().await;
    let a = perms.create(permission("a:1")).await.unwrap();
    for name in ["admin", "operator"] {
        roles
            .create(CreateRole {
                name: name.into(),
                permission_ids: vec![a.id],
            })
            .await
            .unwrap();
    }

    let page = roles.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|r| ids(&r.permissions) == [a.id]));
}
