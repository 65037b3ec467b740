//! User lifecycle on top of the credential store. Plaintext passwords are
//! hashed here and never reach the repository.

use mes_core::error::MesError;
use mes_core::models::user::{CreateUser, NewUser, UpdateUser, User, UserChanges};
use mes_core::repository::{PaginatedResult, Pagination, RefreshTokenRepository, UserRepository};
use tracing::info;

use crate::error::AuthResult;
use crate::password::PasswordHasher;

pub struct UserService<U: UserRepository, T: RefreshTokenRepository> {
    users: U,
    tokens: T,
    hasher: PasswordHasher,
}

impl<U: UserRepository, T: RefreshTokenRepository> UserService<U, T> {
    pub fn new(users: U, tokens: T, hasher: PasswordHasher) -> Self {
        Self {
            users,
            tokens,
            hasher,
        }
    }

    pub async fn create(&self, input: CreateUser) -> AuthResult<User> {
        if input.username.trim().is_empty() {
            return Err(MesError::validation("username must not be empty").into());
        }
        if input.password.is_empty() {
            return Err(MesError::validation("password must not be empty").into());
        }

        let password_hash = self.hasher.hash_blocking(input.password).await?;
        let user = self
            .users
            .create(NewUser {
                username: input.username,
                password_hash,
                full_name: input.full_name,
                role_id: input.role_id,
                email: input.email,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> AuthResult<User> {
        Ok(self.users.get_by_id(id).await?)
    }

    pub async fn list(&self, pagination: Pagination) -> AuthResult<PaginatedResult<User>> {
        Ok(self.users.list(pagination).await?)
    }

    /// Apply a partial update. The stored hash is replaced only when a
    /// new non-empty password is supplied.
    pub async fn update(&self, id: i64, input: UpdateUser) -> AuthResult<User> {
        let password_hash = match input.password {
            Some(password) if !password.is_empty() => {
                Some(self.hasher.hash_blocking(password).await?)
            }
            _ => None,
        };

        let user = self
            .users
            .update(
                id,
                UserChanges {
                    username: input.username,
                    password_hash,
                    full_name: input.full_name,
                    role_id: input.role_id,
                    email: input.email,
                },
            )
            .await?;
        Ok(user)
    }

    /// Delete a user and revoke all of their refresh tokens.
    pub async fn delete(&self, id: i64) -> AuthResult<()> {
        self.users.delete(id).await?;
        let revoked = self.tokens.delete_for_user(id).await?;
        info!(user_id = id, revoked, "user deleted");
        Ok(())
    }
}
