//! Configuration system for switchboard.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::error::{SwitchboardError, SwitchboardResult};
use crate::events::DEFAULT_CAPACITY;
use crate::store::is_valid_table_name;

/// Path that selects an in-memory SQLite database.
pub const MEMORY_PATH: &str = ":memory:";

/// Storage backend type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// Process-local map, lost on exit.
    #[default]
    Memory,
    /// SQLite table with a JSON payload column.
    Sqlite,
}

/// Per-key defaults applied when a switch is first created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchDefault {
    /// `true` creates the switch as global, `false` as disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Main switchboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchboardConfig {
    /// Storage backend.
    pub backend: BackendKind,
    /// SQLite database file, or `:memory:`.
    pub db_path: PathBuf,
    /// Table holding switches; versions go to `<table>_versions`.
    pub table: String,
    /// Record a delta on every save.
    pub versioning: bool,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
    /// Defaults by switch key.
    pub switch_defaults: HashMap<String, SwitchDefault>,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        let switchboard_dir = dirs::home_dir()
            .map(|h| h.join(".switchboard"))
            .unwrap_or_else(|| PathBuf::from(".switchboard"));

        Self {
            backend: BackendKind::Memory,
            db_path: switchboard_dir.join("switchboard.db"),
            table: "switchboard".to_string(),
            versioning: true,
            event_capacity: DEFAULT_CAPACITY,
            switch_defaults: HashMap::new(),
        }
    }
}

impl SwitchboardConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> SwitchboardResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| SwitchboardError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| SwitchboardError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| SwitchboardError::Configuration(e.to_string()))?,
            _ => {
                return Err(SwitchboardError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `SWITCHBOARD_BACKEND`, `SWITCHBOARD_DBURL`, `SWITCHBOARD_DBTABLE`
    /// and `SWITCHBOARD_VERSIONING` on top of the defaults.
    pub fn from_env() -> SwitchboardResult<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> SwitchboardResult<Self> {
        let mut config = Self::default();

        if let Some(backend) = var("SWITCHBOARD_BACKEND") {
            config.backend = BackendKind::from_str(backend.trim()).map_err(|_| {
                SwitchboardError::Configuration(format!("unknown backend '{}'", backend))
            })?;
        }

        // A database URL implies the SQLite backend.
        if let Some(url) = var("SWITCHBOARD_DBURL") {
            config.db_path = parse_db_url(&url)?;
            config.backend = BackendKind::Sqlite;
        }

        if let Some(table) = var("SWITCHBOARD_DBTABLE") {
            config.table = table;
        }

        if let Some(flag) = var("SWITCHBOARD_VERSIONING") {
            config.versioning = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(SwitchboardError::Configuration(format!(
                        "SWITCHBOARD_VERSIONING must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> SwitchboardConfigBuilder {
        SwitchboardConfigBuilder::default()
    }

    /// Check values that would only fail later, when the store is opened.
    pub fn validate(&self) -> SwitchboardResult<()> {
        if !is_valid_table_name(&self.table) {
            return Err(SwitchboardError::invalid_identifier(self.table.clone()));
        }
        if self.event_capacity == 0 {
            return Err(SwitchboardError::Configuration(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings defaults for a switch key, if any.
    pub fn switch_default(&self, key: &str) -> Option<&SwitchDefault> {
        self.switch_defaults.get(key)
    }
}

/// Accepts `sqlite://` (in memory), `sqlite:///relative.db`,
/// `sqlite:////absolute.db`, or a bare path.
fn parse_db_url(url: &str) -> SwitchboardResult<PathBuf> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        if url.contains("://") {
            return Err(SwitchboardError::Configuration(format!(
                "unsupported database url '{}', only sqlite is available",
                url
            )));
        }
        return Ok(PathBuf::from(url));
    };
    match rest.strip_prefix('/') {
        None if rest.is_empty() => Ok(PathBuf::from(MEMORY_PATH)),
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(SwitchboardError::Configuration(format!(
            "database url '{}' has no path",
            url
        ))),
    }
}

/// Builder for SwitchboardConfig.
#[derive(Default)]
pub struct SwitchboardConfigBuilder {
    config: SwitchboardConfig,
}

impl SwitchboardConfigBuilder {
    /// Set the storage backend.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    /// Use SQLite at the given path.
    pub fn sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backend = BackendKind::Sqlite;
        self.config.db_path = path.into();
        self
    }

    /// Set the switch table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = table.into();
        self
    }

    pub fn versioning(mut self, enabled: bool) -> Self {
        self.config.versioning = enabled;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Add defaults for one switch key.
    pub fn switch_default(mut self, key: impl Into<String>, defaults: SwitchDefault) -> Self {
        self.config.switch_defaults.insert(key.into(), defaults);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SwitchboardResult<SwitchboardConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
