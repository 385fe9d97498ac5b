//! Sensei Configuration Module
//!
//! Manages persistent configuration for paths, the test command, the
//! watcher and the reasoning service. Config is stored in
//! `~/.config/sensei/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. CLI flags (applied by `main`)
//! 2. Environment variables (`SENSEI_API_KEY`, `SENSEI_PROVIDER`, `SENSEI_MODEL`)
//! 3. Config file (`~/.config/sensei/config.toml`)
//! 4. Defaults

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SenseiError};
use crate::util::constants::{DEBOUNCE_DELAY, HINT_COOLDOWN, HINT_MAX_PER_DAY, PREVIEW_TIMEOUT};

/// Default reasoning provider and model (local Ollama)
pub const DEFAULT_PROVIDER: &str = "ollama";
pub const DEFAULT_MODEL: &str = "qwen2.5-coder:1.5b";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SenseiConfig {
    #[serde(default)]
    pub paths: Paths,

    #[serde(default)]
    pub check: CheckSettings,

    #[serde(default)]
    pub watch: WatchSettings,

    #[serde(default)]
    pub hints: HintSettings,
}

/// Where katas and notes live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Paths {
    /// Root directory holding one sub-directory per kata
    pub kata_root: PathBuf,
    /// Shared notes directory (hint log, session log)
    pub notes_root: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            kata_root: PathBuf::from("dojo"),
            notes_root: PathBuf::from("notes"),
        }
    }
}

/// Test runner invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckSettings {
    /// Program followed by its arguments; a single test name is appended
    pub command: Vec<String>,
    /// Hard timeout for `check --preview`
    pub preview_timeout_secs: u64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            command: vec!["python3".into(), "-m".into(), "unittest".into()],
            preview_timeout_secs: PREVIEW_TIMEOUT.as_secs(),
        }
    }
}

impl CheckSettings {
    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }
}

/// File watcher settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchSettings {
    /// Extension of tracked source files, without the dot
    pub extension: String,
    /// Quiet period that closes a burst of file events
    pub debounce_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            extension: "py".into(),
            debounce_ms: DEBOUNCE_DELAY.as_millis() as u64,
        }
    }
}

impl WatchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Reasoning service and hint rate limiting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HintSettings {
    /// ollama, openrouter or offline
    pub provider: String,
    pub model: String,
    /// Override the provider endpoint (mostly for tests and remote Ollama)
    pub base_url: Option<String>,
    /// OpenRouter key; normally supplied through `SENSEI_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub cooldown_secs: u64,
    pub max_per_day: usize,
}

impl Default for HintSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.into(),
            model: DEFAULT_MODEL.into(),
            base_url: None,
            api_key: None,
            cooldown_secs: HINT_COOLDOWN.as_secs(),
            max_per_day: HINT_MAX_PER_DAY,
        }
    }
}

impl HintSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl SenseiConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/sensei/` on Unix, `%APPDATA%/sensei/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensei")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default location
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| SenseiError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| SenseiError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        if let Some(key) = non_empty_env("SENSEI_API_KEY") {
            self.hints.api_key = Some(key);
        }
        if let Some(provider) = non_empty_env("SENSEI_PROVIDER") {
            self.hints.provider = provider;
        }
        if let Some(model) = non_empty_env("SENSEI_MODEL") {
            self.hints.model = model;
        }
        self
    }

    /// Validate values that would otherwise fail deep inside a session
    pub fn validate(&self) -> Result<()> {
        if self.check.command.is_empty() {
            return Err(SenseiError::ConfigError {
                reason: "check.command must name a program".into(),
            });
        }
        if self.watch.extension.trim_start_matches('.').is_empty() {
            return Err(SenseiError::ConfigError {
                reason: "watch.extension must not be empty".into(),
            });
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_contains_sensei() {
        let path = SenseiConfig::config_path();
        assert!(path.to_string_lossy().contains("sensei"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = SenseiConfig::default();
        assert_eq!(config.check.command, vec!["python3", "-m", "unittest"]);
        assert_eq!(config.watch.extension, "py");
        assert_eq!(config.watch.debounce(), Duration::from_millis(100));
        assert_eq!(config.hints.provider, "ollama");
        assert_eq!(config.hints.cooldown(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = SenseiConfig::load_from(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, SenseiConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[watch]\nextension = \"rs\"\ndebounce_ms = 250\n").unwrap();

        let config = SenseiConfig::load_from(&path).unwrap();
        assert_eq!(config.watch.extension, "rs");
        assert_eq!(config.watch.debounce_ms, 250);
        assert_eq!(config.hints, HintSettings::default());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[watch\nextension = ").unwrap();

        let err = SenseiConfig::load_from(&path).unwrap_err();
        assert_eq!(err.code(), "SENSEI-040");
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let mut config = SenseiConfig::default();
        config.check.command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_config() {
        env::set_var("SENSEI_PROVIDER", "openrouter");
        env::set_var("SENSEI_API_KEY", "sk-or-test");

        let config = SenseiConfig::default().with_env();
        assert_eq!(config.hints.provider, "openrouter");
        assert_eq!(config.hints.api_key.as_deref(), Some("sk-or-test"));

        env::remove_var("SENSEI_PROVIDER");
        env::remove_var("SENSEI_API_KEY");
    }

    #[test]
    #[serial]
    fn test_empty_env_is_ignored() {
        env::set_var("SENSEI_MODEL", "");
        let config = SenseiConfig::default().with_env();
        assert_eq!(config.hints.model, DEFAULT_MODEL);
        env::remove_var("SENSEI_MODEL");
    }
}
