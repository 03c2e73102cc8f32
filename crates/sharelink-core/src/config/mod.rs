//! Configuration loading.
//!
//! The connection string comes from `DATABASE_URL`, either already present in
//! the process environment or read from a local env file (`.env.local` by
//! default). Everything else is optional: a TOML file layered under
//! environment variables prefixed with `SHARELINK__`.

pub mod database;
pub mod logging;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use self::database::{DatabaseConfig, SslMode};
pub use self::logging::LoggingConfig;

use crate::error::{AppError, ErrorKind};
use crate::result::AppResult;

/// Default env file holding `DATABASE_URL`.
pub const DEFAULT_ENV_FILE: &str = ".env.local";

/// Default optional TOML configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "config/provision.toml";

/// Environment variable carrying the connection string.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Root configuration of the provisioning tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env file the configuration was loaded from, used in error messages.
    #[serde(skip)]
    pub env_file: PathBuf,
}

impl ProvisionConfig {
    /// Load configuration from the env file, the optional TOML file and the
    /// process environment.
    ///
    /// Variables already set in the process environment are not overwritten
    /// by the env file.
    pub fn load(env_file: &Path, config_path: &str) -> AppResult<Self> {
        load_env_file(env_file)?;

        let database_url = std::env::var(DATABASE_URL_VAR).ok();
        Self::from_sources(env_file, config_path, database_url)
    }

    /// Build the configuration from an explicit connection string instead of
    /// reading `DATABASE_URL` from the environment.
    pub fn from_sources(
        env_file: &Path,
        config_path: &str,
        database_url: Option<String>,
    ) -> AppResult<Self> {
        let database_url = database_url.filter(|url| !url.trim().is_empty());

        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SHARELINK")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", database_url)?
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let mut loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        loaded.env_file = env_file.to_path_buf();
        Ok(loaded)
    }

    /// The connection string, or a configuration error naming `DATABASE_URL`.
    pub fn database_url(&self) -> AppResult<&str> {
        match self.database.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(AppError::configuration(format!(
                "{DATABASE_URL_VAR} not found in {}",
                self.env_file.display()
            ))),
        }
    }
}

/// Load variables from an env file into the process environment.
///
/// Returns `Ok(false)` when the file does not exist; a missing file is only an
/// error later if `DATABASE_URL` is not set some other way.
pub fn load_env_file(path: &Path) -> AppResult<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Loaded environment file");
            Ok(true)
        }
        Err(e) if e.not_found() => {
            debug!(path = %path.display(), "Environment file not found");
            Ok(false)
        }
        Err(e) => Err(AppError::with_source(
            ErrorKind::Configuration,
            format!("Failed to read {}: {e}", path.display()),
            e,
        )),
    }
}
