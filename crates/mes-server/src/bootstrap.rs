//! First-start provisioning: default roles and an optional administrator.

use mes_auth::{AuthError, StaticRoleNames, UserService};
use mes_core::error::MesError;
use mes_core::models::role::{CreateRole, Role};
use mes_core::models::user::CreateUser;
use mes_core::repository::{Pagination, RefreshTokenRepository, RoleRepository, UserRepository};
use tracing::{info, warn};

use crate::config::BootstrapAdmin;
use crate::error::ServerResult;

/// Roles every installation starts with, in id order.
pub const DEFAULT_ROLES: [&str; 3] = ["admin", "operator", "viewer"];

/// Create any missing default role and return every stored role.
pub async fn seed_roles<R: RoleRepository>(roles: &R) -> ServerResult<Vec<Role>> {
    for name in DEFAULT_ROLES {
        match roles.get_by_name(name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                let role = roles
                    .create(CreateRole {
                        name: name.to_string(),
                        permission_ids: vec![],
                    })
                    .await?;
                info!(role_id = role.id, name, "seeded role");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut all = Vec::new();
    let mut pagination = Pagination::default();
    loop {
        let page = roles.list(pagination.clone()).await?;
        let fetched = page.items.len() as u64;
        all.extend(page.items);
        if fetched == 0 || all.len() as u64 >= page.total {
            break;
        }
        pagination.offset += fetched;
    }
    Ok(all)
}

/// Log each place where the token role table and the stored roles
/// disagree. Returns the number of divergences.
pub fn report_role_divergences(names: &StaticRoleNames, stored: &[Role]) -> usize {
    let divergences = names.divergences(stored);
    for d in &divergences {
        warn!(
            role_id = d.role_id,
            token_name = %d.static_name,
            stored_name = d.stored_name.as_deref().unwrap_or("<missing>"),
            "role name in tokens differs from stored role"
        );
    }
    divergences.len()
}

/// Create the configured administrator unless the username is taken.
/// Returns whether a user was created.
pub async fn ensure_admin<U, T, R>(
    users: &UserService<U, T>,
    roles: &R,
    admin: &BootstrapAdmin,
) -> ServerResult<bool>
where
    U: UserRepository,
    T: RefreshTokenRepository,
    R: RoleRepository,
{
    let admin_role = roles.get_by_name(DEFAULT_ROLES[0]).await?;

    let result = users
        .create(CreateUser {
            username: admin.username.clone(),
            password: admin.password.clone(),
            full_name: admin.full_name.clone(),
            role_id: admin_role.id,
            email: None,
        })
        .await;

    match result {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "bootstrap administrator created");
            Ok(true)
        }
        Err(AuthError::Store(MesError::AlreadyExists { .. })) => {
            info!(username = %admin.username, "bootstrap administrator already present");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
