//! # Migration Configuration
//!
//! Tuning knobs for the dispatch loop, export dispatcher, timeout watchdog and
//! the Postgres store.
//!
//! ## Sources
//!
//! Values are layered by [`ConfigManager`]:
//!
//! 1. Built-in defaults (see [`crate::constants`])
//! 2. An optional TOML file (`MIGRATION_CONFIG_PATH`, else `config/migration.toml`)
//! 3. Environment variables such as `MIGRATION__DISPATCH__BATCH_SIZE=10`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bulk_import_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let ceiling = manager.config().dispatch.batch_size;
//! let delay = manager.config().dispatch.perform_delay();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_EXPORT_LEASE_TTL, DEFAULT_IMPORT_TIMEOUT, DEFAULT_PERFORM_DELAY,
    DEFAULT_STALE_TRACKER_AFTER,
};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub environment: String,
    pub dispatch: DispatchSettings,
    pub export: ExportSettings,
    pub watchdog: WatchdogSettings,
    pub database: DatabaseSettings,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            dispatch: DispatchSettings::default(),
            export: ExportSettings::default(),
            watchdog: WatchdogSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}

impl MigrationConfig {
    /// Reject settings that would stall or spin the dispatch loop
    pub fn validate(&self) -> ConfigResult<()> {
        if self.dispatch.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.batch_size",
                self.dispatch.batch_size,
                "must be at least 1",
            ));
        }

        if self.dispatch.perform_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.perform_delay_ms",
                self.dispatch.perform_delay_ms,
                "must be greater than zero",
            ));
        }

        if self.dispatch.stale_tracker_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.stale_tracker_seconds",
                self.dispatch.stale_tracker_seconds,
                "must be greater than zero",
            ));
        }

        if self.export.lease_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "export.lease_ttl_seconds",
                self.export.lease_ttl_seconds,
                "must be greater than zero",
            ));
        }

        if self.watchdog.import_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "watchdog.import_timeout_seconds",
                self.watchdog.import_timeout_seconds,
                "must be greater than zero",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                self.database.max_connections,
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Dispatch loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Ceiling of concurrently started entities per import
    pub batch_size: usize,
    /// Delay before the loop re-enqueues itself
    pub perform_delay_ms: u64,
    /// Age after which an entity worker fails a `started` tracker as abandoned
    pub stale_tracker_seconds: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            perform_delay_ms: DEFAULT_PERFORM_DELAY.as_millis() as u64,
            stale_tracker_seconds: DEFAULT_STALE_TRACKER_AFTER.as_secs(),
        }
    }
}

impl DispatchSettings {
    pub fn perform_delay(&self) -> Duration {
        Duration::from_millis(self.perform_delay_ms)
    }

    pub fn stale_tracker_after(&self) -> Duration {
        Duration::from_secs(self.stale_tracker_seconds)
    }
}

/// Relation export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub lease_ttl_seconds: u64,
    /// When false every export runs single-shot regardless of the request
    pub batched_enabled: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            lease_ttl_seconds: DEFAULT_EXPORT_LEASE_TTL.as_secs(),
            batched_enabled: true,
        }
    }
}

impl ExportSettings {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    pub import_timeout_seconds: u64,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            import_timeout_seconds: DEFAULT_IMPORT_TIMEOUT.as_secs(),
        }
    }
}

impl WatchdogSettings {
    pub fn import_timeout(&self) -> Duration {
        Duration::from_secs(self.import_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Falls back to `DATABASE_URL` when unset
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

impl DatabaseSettings {
    pub fn database_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
    }
}
