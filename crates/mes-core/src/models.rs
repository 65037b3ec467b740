//! Domain models for the MES RBAC backend.

pub mod permission;
pub mod refresh_token;
pub mod role;
pub mod user;
