//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables prefixed with `MES__` (nested keys separated by
//! `__`, e.g. `MES__AUTH__JWT_SECRET`).

use std::fmt;
use std::path::Path;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use mes_auth::AuthConfig;
use mes_db::DbConfig;
use serde::Deserialize;

use crate::error::{ServerError, ServerResult};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
/// File used when `CONFIG_PATH` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
    Compact,
}

/// Administrator account created on first start if absent.
#[derive(Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database: DbConfig,
    pub auth: AuthConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Interval between sweeps of expired refresh tokens.
    pub token_cleanup_interval_secs: u64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: DbConfig::default(),
            auth: AuthConfig::default(),
            log_level: "info".into(),
            log_format: LogFormat::Text,
            token_cleanup_interval_secs: 3600,
            bootstrap_admin: None,
        }
    }
}

impl ServerConfig {
    /// Load from the file at `path` (skipped if missing) and the
    /// environment.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let builder = config::Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("MES")
                    .prefix_separator("__")
                    .separator("__"),
            );
        Self::finish(builder)
    }

    /// Load from the path named by `CONFIG_PATH`, falling back to
    /// `config.yaml`.
    pub fn load_default() -> ServerResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Parse a YAML document without consulting the environment.
    pub fn from_yaml_str(content: &str) -> ServerResult<Self> {
        let builder =
            config::Config::builder().add_source(File::from_str(content, FileFormat::Yaml));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> ServerResult<Self> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ServerError::config("auth.jwt_secret must be set"));
        }
        if self.auth.access_token_lifetime_secs == 0 {
            return Err(ServerError::config(
                "auth.access_token_lifetime_secs must be positive",
            ));
        }
        if self.token_cleanup_interval_secs == 0 {
            return Err(ServerError::config(
                "token_cleanup_interval_secs must be positive",
            ));
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.username.is_empty() || admin.password.is_empty() {
                return Err(ServerError::config(
                    "bootstrap_admin needs a username and a password",
                ));
            }
        }
        Ok(())
    }
}
