//! Configuration management
//!
//! This module handles loading and saving the ya-backup configuration file.
//! The configuration file is stored in TOML format at ~/.config/ya-backup/config.toml.
//! A legacy YAML backup list (`path: { days to store: N, archive: bool }`) is
//! also accepted when the file has a `.yml` or `.yaml` extension.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backup::BackupTarget;
use crate::error::{Error, Result};
use crate::path::DEFAULT_DATE_FORMAT;

/// Current configuration schema version
///
/// IMPORTANT: Bumping this version requires:
/// 1. Adding a migration in `ConfigManager::migrate`
/// 2. Updating migration tests
/// 3. Marking the change as BREAKING
pub const SCHEMA_VERSION: u32 = 1;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Where backups go and how they are named
    #[serde(default)]
    pub remote: RemoteConfig,

    /// HTTP client timeouts
    #[serde(default)]
    pub timeout: TimeoutConfig,

    /// Local paths to back up
    #[serde(default)]
    pub targets: Vec<BackupTarget>,
}

/// Remote naming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote directory all backups are stored in
    #[serde(default)]
    pub root: String,

    /// Prefix for every backup name
    #[serde(default)]
    pub prefix: String,

    /// strftime format of the date stamp
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            prefix: String::new(),
            date_format: default_date_format(),
        }
    }
}

/// Timeout configuration for the HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    60000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            remote: RemoteConfig::default(),
            timeout: TimeoutConfig::default(),
            targets: Vec::new(),
        }
    }
}

impl Config {
    /// Replace remote settings with values given on the command line or in the environment
    pub fn apply_overrides(&mut self, root: Option<String>, prefix: Option<String>) {
        if let Some(root) = root {
            self.remote.root = root;
        }
        if let Some(prefix) = prefix {
            self.remote.prefix = prefix;
        }
    }

    /// Check values serde cannot check
    pub fn validate(&self) -> Result<()> {
        if self.remote.date_format.is_empty() {
            return Err(Error::Config("date_format must not be empty".into()));
        }
        for target in &self.targets {
            if target.path.as_os_str().is_empty() {
                return Err(Error::Config("target path must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Find a configured target by its local path
    pub fn target(&self, path: &Path) -> Option<&BackupTarget> {
        let wanted = path.components().collect::<PathBuf>();
        self.targets
            .iter()
            .find(|t| t.path.components().collect::<PathBuf>() == wanted)
    }
}

/// One entry of the legacy YAML backup list
#[derive(Debug, Deserialize)]
struct LegacyEntry {
    #[serde(rename = "days to store")]
    days_to_store: usize,
    archive: bool,
}

/// Parse a legacy YAML backup list, keeping the file order
fn parse_legacy(content: &str) -> Result<Vec<BackupTarget>> {
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(content)?;
    let mut targets = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let path = key
            .as_str()
            .ok_or_else(|| Error::Config(format!("backup list key {key:?} is not a path")))?
            .to_string();
        let entry: LegacyEntry = serde_yaml::from_value(value)?;
        targets.push(BackupTarget::new(path, entry.days_to_store, entry.archive));
    }
    Ok(targets)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("ya-backup").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    /// If the schema version doesn't match, attempts migration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        if is_yaml(&self.config_path) {
            let config = Config {
                targets: parse_legacy(&content)?,
                ..Config::default()
            };
            config.validate()?;
            return Ok(config);
        }

        let mut config: Config = toml::from_str(&content)?;

        // Check schema version and migrate if necessary
        if config.schema_version < SCHEMA_VERSION {
            config = self.migrate(config)?;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade yb.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if is_yaml(&self.config_path) {
            return Err(Error::Config(
                "YAML backup lists are read-only, save to a .toml path".into(),
            ));
        }

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }

    /// Migrate configuration from older schema version
    fn migrate(&self, config: Config) -> Result<Config> {
        let mut config = config;
        config.schema_version = SCHEMA_VERSION;
        Ok(config)
    }
}
