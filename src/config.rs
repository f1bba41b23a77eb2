//! Migration settings
//!
//! [`MigrateConfig::load`] layers, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `tidemark.toml` in the working directory (or an explicit file)
//! 3. `TIDEMARK__*` environment variables, e.g. `TIDEMARK__DATABASE_URL`
//! 4. `DATABASE_URL`, only when no database URL was set above
//!
//! Command-line flags are applied afterwards with [`MigrateConfig::with_overrides`].

use crate::migration::{HistoryTable, MigrationError, DEFAULT_HISTORY_TABLE};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up when no explicit path is given (any format `config` supports)
pub const DEFAULT_CONFIG_FILE: &str = "tidemark";

/// Prefix of environment variables, separated from the key by `__`
pub const ENV_PREFIX: &str = "TIDEMARK";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigrateConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_history_table")]
    pub history_table: String,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_history_table() -> String {
    DEFAULT_HISTORY_TABLE.to_string()
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            migrations_dir: default_migrations_dir(),
            history_table: default_history_table(),
        }
    }
}

/// Values supplied on the command line; `None` keeps the loaded value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub migrations_dir: Option<PathBuf>,
    pub history_table: Option<String>,
}

impl MigrateConfig {
    /// Load settings from the config file and the environment
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Configuration` if an explicit `path` cannot be read
    /// or any source holds a value of the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, MigrationError> {
        let loaded = Self::load_with_prefix(path, ENV_PREFIX)?;
        Ok(loaded.with_database_url_fallback(std::env::var("DATABASE_URL").ok()))
    }

    /// [`MigrateConfig::load`] with a custom environment prefix and no `DATABASE_URL` fallback
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, MigrationError> {
        let environment = || Environment::with_prefix(env_prefix).separator("__");

        let settings = match path {
            Some(path) => Config::builder()
                .add_source(File::from(path).required(true))
                .add_source(environment())
                .build()
                .map_err(|e| config_error(Some(path), e))?,
            None => {
                let builder = Config::builder()
                    .add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false))
                    .add_source(environment());

                match builder.build() {
                    Ok(settings) => settings,
                    Err(err) => {
                        // Unreadable default file: fall back to the environment alone
                        log::warn!("Failed to load {DEFAULT_CONFIG_FILE} config file, falling back to env: {err}");
                        Config::builder()
                            .add_source(environment())
                            .build()
                            .map_err(|e| config_error(None, e))?
                    }
                }
            }
        };

        let config: MigrateConfig = settings
            .try_deserialize()
            .map_err(|e| config_error(path, e))?;
        Ok(config.normalized())
    }

    /// Use `fallback` as the database URL when none is configured
    pub fn with_database_url_fallback(mut self, fallback: Option<String>) -> Self {
        if self.database_url.is_none() {
            self.database_url = fallback;
        }
        self.normalized()
    }

    /// Apply command-line values on top of the loaded ones
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(url) = overrides.database_url {
            self.database_url = Some(url);
        }
        if let Some(dir) = overrides.migrations_dir {
            self.migrations_dir = dir;
        }
        if let Some(table) = overrides.history_table {
            self.history_table = table;
        }
        self.normalized()
    }

    /// The connection string, required by every command that talks to the database
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Configuration` when no URL is configured.
    pub fn require_database_url(&self) -> Result<&str, MigrationError> {
        self.database_url.as_deref().ok_or_else(|| {
            MigrationError::Configuration(format!(
                "no database URL configured; pass --dsn or set {ENV_PREFIX}__DATABASE_URL or DATABASE_URL"
            ))
        })
    }

    /// The validated history table name
    pub fn history_table(&self) -> Result<HistoryTable, MigrationError> {
        HistoryTable::new(self.history_table.clone())
    }

    // An empty URL counts as unset.
    fn normalized(mut self) -> Self {
        if self.database_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            self.database_url = None;
        }
        self
    }
}

fn config_error(path: Option<&Path>, err: ConfigError) -> MigrationError {
    match path {
        Some(path) => MigrationError::Configuration(format!(
            "failed to load configuration from {}: {err}",
            path.display()
        )),
        None => MigrationError::Configuration(format!("failed to load configuration: {err}")),
    }
}
