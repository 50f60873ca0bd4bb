//! # Gateway Configuration
//!
//! Settings come from four layers, highest first:
//! 1. CLI flags (applied by the command dispatcher)
//! 2. `EDG_*` environment variables
//! 3. The TOML file (`edg.toml` unless `--config` names another)
//! 4. Built-in defaults
//!
//! ```toml
//! [storage]
//! database = "data/metadata.redb"
//!
//! [templates]
//! directory = "templates"
//!
//! [gateway]
//! host = "127.0.0.1"
//! port = 4280
//! forward = true
//! channel_capacity = 1024
//! ```

use edg_core::EdgError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given. Its absence is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "edg.toml";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// redb database file.
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("data/metadata.redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory of template definition files.
    pub directory: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Republish accepted readings on `platform.data.validated`.
    pub forward: bool,
    /// Buffered messages per bus subject before slow subscribers lag.
    pub channel_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4280,
            forward: true,
            channel_capacity: 1024,
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub templates: TemplatesConfig,
    pub gateway: GatewayConfig,
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Resolve the configuration from file, environment and defaults.
    ///
    /// An explicitly named file must exist and parse. Without one,
    /// `edg.toml` in the working directory is used if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self, EdgError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing sections and keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EdgError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EdgError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            EdgError::InvalidConfig(format!("failed to parse {}: {e}", path.display()))
        })
    }

    fn apply_env_overrides(&mut self) -> Result<(), EdgError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `EDG_DATABASE`, `EDG_TEMPLATES`, `EDG_HOST` and `EDG_PORT`
    /// as returned by `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), EdgError> {
        if let Some(database) = lookup("EDG_DATABASE") {
            self.storage.database = PathBuf::from(database);
        }
        if let Some(directory) = lookup("EDG_TEMPLATES") {
            self.templates.directory = PathBuf::from(directory);
        }
        if let Some(host) = lookup("EDG_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("EDG_PORT") {
            self.gateway.port = port
                .parse()
                .map_err(|_| EdgError::InvalidConfig(format!("invalid EDG_PORT value: {port}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EdgError> {
        if self.gateway.host.trim().is_empty() {
            return Err(EdgError::InvalidConfig("gateway host cannot be empty".into()));
        }
        if self.gateway.channel_capacity == 0 {
            return Err(EdgError::InvalidConfig(
                "gateway channel_capacity must be at least 1".into(),
            ));
        }
        if self.storage.database.as_os_str().is_empty() {
            return Err(EdgError::InvalidConfig("storage database path cannot be empty".into()));
        }
        Ok(())
    }

    /// `host:port` to bind the HTTP bridge to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================
