//! Configuration management for Specwright.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `specwright.toml` file
//! 3. User config `~/.config/specwright/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

use crate::status::ProjectSettings;

/// Name of the project-local config file.
pub const LOCAL_CONFIG_FILE: &str = "specwright.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Defaults for newly created projects.
    pub project: ProjectConfig,

    /// Output watching configuration.
    pub watch: WatchConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./specwright.toml` (project local)
    /// 2. `~/.config/specwright/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(LOCAL_CONFIG_FILE).exists() {
            return Self::from_file(LOCAL_CONFIG_FILE);
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Path of the per-user config file, if the platform has a config dir.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("specwright").join("config.toml"))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unparseable numeric or boolean values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Storage overrides
        if let Some(root) = lookup("SPECWRIGHT_ROOT") {
            self.storage.root_dir = root;
        }
        if let Some(dir) = lookup("SPECWRIGHT_PROJECTS_DIR") {
            self.storage.projects_dir = dir;
        }

        // Project overrides
        if let Some(assistant) = lookup("SPECWRIGHT_ASSISTANT") {
            self.project.assistant = assistant;
        }
        if let Some(flag) = lookup("SPECWRIGHT_AUTO_RECOVER") {
            if let Ok(b) = flag.parse() {
                self.project.auto_recover = b;
            }
        }

        // Watch overrides
        if let Some(ms) = lookup("SPECWRIGHT_POLL_INTERVAL_MS") {
            if let Ok(n) = ms.parse() {
                self.watch.poll_interval_ms = n;
            }
        }
        if let Some(secs) = lookup("SPECWRIGHT_WATCH_TIMEOUT_SECS") {
            if let Ok(n) = secs.parse() {
                self.watch.timeout_secs = n;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("SPECWRIGHT_LOG") {
            self.logging.level = level;
        }
    }

    /// Rejects values that would make later operations misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.projects_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.projects_dir is empty".into()));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "watch.poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory all other paths are relative to.
    pub root_dir: String,

    /// Subdirectory holding one directory per project.
    pub projects_dir: String,

    /// Per-project subdirectory for status and session records.
    pub state_dir: String,

    /// Status record file name.
    pub status_file: String,

    /// Session record file name.
    pub sessions_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: DEFAULT_ROOT_DIR.to_string(),
            projects_dir: DEFAULT_PROJECTS_DIR.to_string(),
            state_dir: DEFAULT_STATE_DIR.to_string(),
            status_file: DEFAULT_STATUS_FILE.to_string(),
            sessions_file: DEFAULT_SESSIONS_FILE.to_string(),
        }
    }
}

impl StorageConfig {
    /// Creates a config rooted at `root` with default names.
    pub fn rooted(root: impl AsRef<Path>) -> Self {
        Self {
            root_dir: root.as_ref().display().to_string(),
            ..Self::default()
        }
    }

    /// Returns the directory holding all projects.
    pub fn projects_path(&self) -> PathBuf {
        PathBuf::from(&self.root_dir).join(&self.projects_dir)
    }

    /// Returns a project's directory.
    pub fn project_path(&self, project_id: &str) -> PathBuf {
        self.projects_path().join(project_id)
    }

    /// Returns a project's record directory.
    pub fn state_path(&self, project_id: &str) -> PathBuf {
        self.project_path(project_id).join(&self.state_dir)
    }
}

/// Defaults applied to newly created projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Assistant that receives composed prompts.
    pub assistant: String,

    /// Validate and recover before resuming work.
    pub auto_recover: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            assistant: DEFAULT_ASSISTANT.to_string(),
            auto_recover: DEFAULT_AUTO_RECOVER,
        }
    }
}

impl ProjectConfig {
    pub fn to_settings(&self) -> ProjectSettings {
        ProjectSettings {
            assistant: self.assistant.clone(),
            auto_recover: self.auto_recover,
        }
    }
}

/// Generated-output watching configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Give up after this many seconds.
    pub timeout_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_secs: DEFAULT_WATCH_TIMEOUT_SECS,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_from_lookup() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "SPECWRIGHT_ROOT" => Some("/srv/specs".to_string()),
            "SPECWRIGHT_AUTO_RECOVER" => Some("false".to_string()),
            "SPECWRIGHT_POLL_INTERVAL_MS" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(config.storage.root_dir, "/srv/specs");
        assert!(!config.project.auto_recover);
        assert_eq!(config.watch.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_state_path() {
        let config = StorageConfig::rooted("/work");
        assert_eq!(
            config.state_path("042"),
            PathBuf::from("/work/projects/042/.specwright")
        );
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.watch.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
