//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and `MIGRATION__*`
//! environment variables into a validated [`MigrationConfig`].

use super::error::{ConfigResult, ConfigurationError};
use super::MigrationConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/migration.toml";
const CONFIG_PATH_VAR: &str = "MIGRATION_CONFIG_PATH";
const ENV_PREFIX: &str = "MIGRATION";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigManager {
    config: MigrationConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from defaults, the discovered file and the environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let required = env::var(CONFIG_PATH_VAR).is_ok();

        Self::build(Some((path, required)), true)
    }

    /// Load configuration from an explicit file layered over the defaults.
    ///
    /// Environment variables are not consulted, which keeps the result
    /// reproducible for tooling and tests.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::FileNotFound(path.display().to_string()));
        }

        Self::build(Some((path.to_path_buf(), true)), false)
    }

    /// Defaults only
    pub fn from_defaults() -> Arc<ConfigManager> {
        let config = MigrationConfig {
            environment: Self::detect_environment(),
            ..MigrationConfig::default()
        };

        Arc::new(ConfigManager {
            environment: config.environment.clone(),
            config,
            source_path: None,
        })
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was read from, if one existed
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Current environment from `MIGRATION_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var("MIGRATION_ENV").unwrap_or_else(|_| "development".to_string())
    }

    fn build(file: Option<(PathBuf, bool)>, with_env: bool) -> ConfigResult<Arc<ConfigManager>> {
        let defaults = MigrationConfig::default();
        let environment = Self::detect_environment();

        let mut builder = Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("dispatch.batch_size", defaults.dispatch.batch_size as u64)?
            .set_default("dispatch.perform_delay_ms", defaults.dispatch.perform_delay_ms)?
            .set_default(
                "dispatch.stale_tracker_seconds",
                defaults.dispatch.stale_tracker_seconds,
            )?
            .set_default("export.lease_ttl_seconds", defaults.export.lease_ttl_seconds)?
            .set_default("export.batched_enabled", defaults.export.batched_enabled)?
            .set_default(
                "watchdog.import_timeout_seconds",
                defaults.watchdog.import_timeout_seconds,
            )?
            .set_default(
                "database.max_connections",
                u64::from(defaults.database.max_connections),
            )?;

        let mut source_path = None;
        if let Some((path, required)) = file {
            if path.is_file() {
                source_path = Some(path.clone());
            }
            debug!(
                path = %path.display(),
                required = required,
                "Adding configuration file source"
            );
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        if with_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );
        }

        let config: MigrationConfig = builder
            .build()
            .map_err(|e| ConfigurationError::load_failed(describe(source_path.as_deref()), e))?
            .try_deserialize()
            .map_err(|e| ConfigurationError::load_failed(describe(source_path.as_deref()), e))?;

        config.validate()?;

        info!(
            environment = %config.environment,
            batch_size = config.dispatch.batch_size,
            perform_delay_ms = config.dispatch.perform_delay_ms,
            lease_ttl_seconds = config.export.lease_ttl_seconds,
            source = %describe(source_path.as_deref()),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            environment: config.environment.clone(),
            config,
            source_path,
        }))
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string())
}
