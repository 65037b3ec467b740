//! SurrealDB repository implementations.

mod permission;
mod refresh_token;
mod role;
mod user;

pub use permission::SurrealPermissionRepository;
pub use refresh_token::SurrealRefreshTokenRepository;
pub use role::SurrealRoleRepository;
pub use user::SurrealUserRepository;
