//! MES Auth: Password hashing, JWT issuance/verification, refresh-token
//! rotation and role checks.

pub mod config;
pub mod error;
pub mod guard;
pub mod observer;
pub mod password;
pub mod role_name;
pub mod service;
pub mod token;
pub mod users;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guard::{RoleGuard, bearer_token};
pub use observer::{AuthObserver, CleanupAction, TracingObserver};
pub use password::PasswordHasher;
pub use role_name::{RoleNameResolver, StaticRoleNames, StoreRoleNames};
pub use service::{AuthService, LoginOutput, RefreshOutput};
pub use token::{AuthClaims, TokenIssuer};
pub use users::UserService;
