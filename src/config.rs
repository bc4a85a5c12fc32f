use std::path::Path;

use serde::Deserialize;

use crate::error::DbManagerError;
use crate::manager::DbManager;

pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

/// Settings for a [`DbManager`], usually read from a JSON file.
///
/// ```rust
/// use db_manager::prelude::*;
///
/// let cfg = ManagerConfig::from_json(
///     r#"{ "provider": "sqlite", "connection_string": "Data Source=app.db" }"#,
/// )
/// .unwrap();
/// assert_eq!(cfg.command_timeout_secs, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManagerConfig {
    /// Provider name, e.g. `sqlite`, `postgres`, `System.Data.SqlClient`
    pub provider: String,
    pub connection_string: String,
    /// Seconds a command may run; `0` means no limit
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl ManagerConfig {
    #[must_use]
    pub fn new(provider: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            connection_string: connection_string.into(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }

    /// # Errors
    /// Returns `DbManagerError::ConfigError` if the JSON does not describe a config.
    pub fn from_json(json: &str) -> Result<Self, DbManagerError> {
        serde_json::from_str(json)
            .map_err(|e| DbManagerError::ConfigError(format!("invalid manager config: {e}")))
    }

    /// # Errors
    /// Returns `DbManagerError::ConfigError` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DbManagerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbManagerError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }
}

/// Fluent builder for a [`DbManager`].
#[derive(Debug, Clone)]
pub struct DbManagerBuilder {
    config: ManagerConfig,
}

impl DbManagerBuilder {
    #[must_use]
    pub fn new(provider: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            config: ManagerConfig::new(provider, connection_string),
        }
    }

    #[must_use]
    pub fn command_timeout(mut self, secs: u64) -> Self {
        self.config.command_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn finish(self) -> ManagerConfig {
        self.config
    }

    /// # Errors
    /// Returns the same errors as [`DbManager::new`].
    pub fn build(self) -> Result<DbManager, DbManagerError> {
        DbManager::from_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_timeout_overrides_default() {
        let cfg = ManagerConfig::from_json(
            r#"{"provider":"postgres","connection_string":"Host=h;Database=d","command_timeout_secs":0}"#,
        )
        .unwrap();
        assert_eq!(cfg.command_timeout_secs, 0);
        assert_eq!(cfg.provider, "postgres");
    }

    #[test]
    fn missing_fields_are_config_errors() {
        let err = ManagerConfig::from_json(r#"{"provider":"sqlite"}"#).unwrap_err();
        assert!(matches!(err, DbManagerError::ConfigError(_)));
    }

    #[test]
    fn builder_collects_settings() {
        let cfg = DbManagerBuilder::new("sqlite", "Data Source=x.db")
            .command_timeout(12)
            .finish();
        assert_eq!(cfg.command_timeout_secs, 12);
        assert_eq!(cfg.connection_string, "Data Source=x.db");
    }
}
