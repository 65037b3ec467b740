//! MES RBAC server: configuration, logging, database bootstrap and
//! background maintenance.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod janitor;
pub mod logging;

use std::time::Duration;

use mes_auth::{PasswordHasher, StaticRoleNames, TokenIssuer, UserService};
use mes_db::DbManager;
use mes_db::repository::{
    SurrealRefreshTokenRepository, SurrealRoleRepository, SurrealUserRepository,
};
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};

/// Connect, provision and run background maintenance until Ctrl-C.
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    config.validate()?;

    // Fail fast on unusable auth settings.
    let issuer = TokenIssuer::new(&config.auth)?;
    let hasher = PasswordHasher::new(&config.auth)?;

    let manager = DbManager::connect(&config.database).await?;
    let db = manager.client().clone();

    let roles = SurrealRoleRepository::new(db.clone());
    let users = SurrealUserRepository::new(db.clone());
    let tokens = SurrealRefreshTokenRepository::new(db);

    let stored_roles = bootstrap::seed_roles(&roles).await?;
    bootstrap::report_role_divergences(&StaticRoleNames::default(), &stored_roles);

    if let Some(admin) = &config.bootstrap_admin {
        let user_service = UserService::new(users, tokens.clone(), hasher);
        bootstrap::ensure_admin(&user_service, &roles, admin).await?;
    }

    info!(
        access_token_lifetime_secs = issuer.lifetime_secs(),
        roles = stored_roles.len(),
        "MES server ready"
    );

    janitor::run_token_janitor(
        tokens,
        Duration::from_secs(config.token_cleanup_interval_secs),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        },
    )
    .await;

    info!("MES server stopped");
    Ok(())
}
