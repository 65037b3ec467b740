//! Authentication service: login, refresh-token rotation and access-token
//! verification.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mes_core::models::refresh_token::{CreateRefreshToken, RefreshToken};
use mes_core::models::user::User;
use mes_core::repository::{RefreshTokenRepository, UserRepository};
use tracing::{debug, info};

use crate::config::{AuthConfig, REFRESH_TOKEN_LIFETIME_SECS};
use crate::error::{AuthError, AuthResult};
use crate::observer::{AuthObserver, CleanupAction, TracingObserver};
use crate::password::PasswordHasher;
use crate::role_name::{RoleNameResolver, StaticRoleNames};
use crate::token::{self, AuthClaims, TokenIssuer};

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Raw opaque refresh token (return to client, stored only as digest).
    pub refresh_token: String,
    /// The authenticated user. Serialize it through [`User::view`].
    pub user: User,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Successful refresh result (new token pair).
#[derive(Debug)]
pub struct RefreshOutput {
    /// New signed JWT access token.
    pub access_token: String,
    /// New opaque refresh token (replaces the consumed one).
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate. Holds no mutable state and
/// can be shared across requests.
pub struct AuthService<U, T, R = StaticRoleNames, O = TracingObserver>
where
    U: UserRepository,
    T: RefreshTokenRepository + 'static,
    R: RoleNameResolver,
    O: AuthObserver,
{
    users: U,
    tokens: Arc<T>,
    roles: R,
    observer: Arc<O>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
}

impl<U, T> AuthService<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository + 'static,
{
    /// Service with the static role table and the tracing observer.
    pub fn new(users: U, tokens: T, config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            users,
            tokens: Arc::new(tokens),
            roles: StaticRoleNames::default(),
            observer: Arc::new(TracingObserver),
            hasher: PasswordHasher::new(config)?,
            issuer: TokenIssuer::new(config)?,
        })
    }
}

impl<U, T, R, O> AuthService<U, T, R, O>
where
    U: UserRepository,
    T: RefreshTokenRepository + 'static,
    R: RoleNameResolver,
    O: AuthObserver,
{
    /// Replace the role-name resolver.
    pub fn with_role_names<R2: RoleNameResolver>(self, roles: R2) -> AuthService<U, T, R2, O> {
        AuthService {
            users: self.users,
            tokens: self.tokens,
            roles,
            observer: self.observer,
            hasher: self.hasher,
            issuer: self.issuer,
        }
    }

    /// Replace the observer that receives swallowed cleanup errors.
    pub fn with_observer<O2: AuthObserver>(self, observer: O2) -> AuthService<U, T, R, O2> {
        AuthService {
            users: self.users,
            tokens: self.tokens,
            roles: self.roles,
            observer: Arc::new(observer),
            hasher: self.hasher,
            issuer: self.issuer,
        }
    }

    /// The password hasher, for sharing with a [`crate::UserService`].
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// The access token issuer.
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Authenticate a user with username + password and issue tokens.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<LoginOutput> {
        // 1. Look up user. Any failure is reported as bad credentials so
        //    callers cannot probe which usernames exist.
        let user = match self.users.get_by_username(username).await {
            Ok(u) => u,
            Err(e) => {
                debug!(error = %e, "login lookup failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        // 2. Verify password.
        let valid = self
            .hasher
            .verify_blocking(user.password_hash.clone(), password.to_string())
            .await?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        // 3. Issue tokens.
        let role = self.roles.role_name(user.role_id).await?;
        let access_token = self.issuer.issue_access_token(user.id, &role)?;

        let (refresh_token, record) = new_refresh_token(user.id);
        self.tokens.create(record).await?;

        info!(user_id = user.id, role = %role, "user authenticated");

        Ok(LoginOutput {
            access_token,
            refresh_token,
            user,
            expires_in: self.issuer.lifetime_secs(),
        })
    }

    /// Rotate a refresh token: consume the presented one and issue a new
    /// token pair.
    ///
    /// Each refresh token is single-use. Of several concurrent calls
    /// presenting the same token at most one succeeds.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshOutput> {
        // 1. Look up record by token digest.
        let token_hash = token::hash_refresh_token(refresh_token);
        let record = match self.tokens.get_by_token_hash(&token_hash).await {
            Ok(r) => r,
            Err(e) if e.is_not_found() => return Err(AuthError::InvalidRefreshToken),
            Err(e) => return Err(e.into()),
        };

        // 2. Expired records are deleted, never flagged.
        if record.is_expired_at(Utc::now()) {
            if let Err(e) = self.tokens.delete_by_token_hash(&token_hash).await {
                self.observer
                    .cleanup_failed(CleanupAction::DeleteExpiredRefreshToken, &e);
            }
            return Err(AuthError::RefreshTokenExpired);
        }

        // 3. Resolve the owner and issue the new access token. A record
        //    whose owner is gone can never be used again.
        let user = match self.users.get_by_id(record.user_id).await {
            Ok(u) => u,
            Err(e) => {
                if e.is_not_found() {
                    if let Err(cleanup) = self.tokens.delete_by_token_hash(&token_hash).await {
                        self.observer
                            .cleanup_failed(CleanupAction::DeleteOrphanedRefreshToken, &cleanup);
                    }
                }
                return Err(e.into());
            }
        };
        let role = self.roles.role_name(user.role_id).await?;
        let access_token = self.issuer.issue_access_token(user.id, &role)?;

        // 4. Rotate. Consume and persist run in their own task so that
        //    dropping this future cannot stop between the two.
        let (new_refresh, replacement) = new_refresh_token(user.id);
        let rotation = tokio::spawn(rotate(
            Arc::clone(&self.tokens),
            Arc::clone(&self.observer),
            record,
            replacement,
        ));
        rotation
            .await
            .map_err(|e| AuthError::Internal(format!("rotation task failed: {e}")))??;

        debug!(user_id = user.id, "refresh token rotated");

        Ok(RefreshOutput {
            access_token,
            refresh_token: new_refresh,
            expires_in: self.issuer.lifetime_secs(),
        })
    }

    /// Verify an access token and return its claims.
    pub fn verify(&self, access_token: &str) -> AuthResult<AuthClaims> {
        self.issuer.verify_access_token(access_token)
    }
}

/// A fresh raw refresh token and the record that persists its digest.
fn new_refresh_token(user_id: i64) -> (String, CreateRefreshToken) {
    let raw = token::generate_refresh_token();
    let record = CreateRefreshToken {
        user_id,
        token_hash: token::hash_refresh_token(&raw),
        expires_at: Utc::now() + Duration::seconds(REFRESH_TOKEN_LIFETIME_SECS),
    };
    (raw, record)
}

/// Consume `old` and persist `replacement`. If the replacement cannot be
/// stored the old record is put back so the client can retry.
async fn rotate<T, O>(
    tokens: Arc<T>,
    observer: Arc<O>,
    old: RefreshToken,
    replacement: CreateRefreshToken,
) -> AuthResult<()>
where
    T: RefreshTokenRepository,
    O: AuthObserver,
{
    if !tokens.consume(old.id).await? {
        // Another request rotated this token first.
        return Err(AuthError::InvalidRefreshToken);
    }

    if let Err(e) = tokens.create(replacement).await {
        if let Err(restore_err) = tokens.create(CreateRefreshToken::from(&old)).await {
            observer.cleanup_failed(CleanupAction::RestoreRefreshToken, &restore_err);
        }
        return Err(e.into());
    }

    Ok(())
}
