use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::DEFAULT_BASE_URL;

const CONFIG_FILE_NAME: &str = "config.toml";
const API_KEY_ENV: &str = "PLAYLIST_WATCH_API_KEY";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub poll: PollConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// YouTube Data API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, `playlists` is appended to it
    pub base_url: String,
    /// Static API key (PLAYLIST_WATCH_API_KEY overrides)
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
        }
    }
}

/// Polling schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between scheduled passes
    pub interval_secs: u64,
    /// Seconds before the first scheduled pass
    pub initial_delay_secs: u64,
    /// Run one pass immediately at startup
    pub run_on_startup: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            initial_delay_secs: 60,
            run_on_startup: true,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database path (empty = default data dir)
    pub db_path: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset: "error", "warn", "info", "debug", "trace"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("playlist-watch");

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or create a default one there if it
    /// does not exist. The API key env var wins over the file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            toml::from_str::<Config>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.api.api_key = key.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Refuse to poll without credentials.
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.trim().is_empty() {
            bail!(
                "No API key configured. Set api.api_key in {} or the {} environment variable",
                CONFIG_FILE_NAME,
                API_KEY_ENV
            );
        }
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        Ok(())
    }

    /// Database path from config, or the default data dir location.
    pub fn db_path(&self) -> Result<PathBuf> {
        match self.storage.db_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => crate::storage::LocalStorage::default_path(),
        }
    }

    /// Generate example config content for documentation
    pub fn example_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "https://www.googleapis.com/youtube/v3/");
        assert!(config.api.api_key.is_empty());
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.poll.initial_delay_secs, 60);
        assert!(config.poll.run_on_startup);
        assert!(config.storage.db_path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial_toml = r#"
[api]
api_key = "abc123"
"#;

        let config: Config = toml::from_str(partial_toml).unwrap();

        // Custom value
        assert_eq!(config.api.api_key, "abc123");
        // Default values
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_config_parsing() {
        let full_toml = r#"
[api]
base_url = "http://localhost:8080/youtube/v3/"
api_key = "k"

[poll]
interval_secs = 300
initial_delay_secs = 5
run_on_startup = false

[storage]
db_path = "/custom/subs.redb"

[logging]
level = "debug"
"#;

        let config: Config = toml::from_str(full_toml).unwrap();

        assert_eq!(config.api.base_url, "http://localhost:8080/youtube/v3/");
        assert_eq!(config.poll.interval(), Duration::from_secs(300));
        assert_eq!(config.poll.initial_delay(), Duration::from_secs(5));
        assert!(!config.poll.run_on_startup);
        assert_eq!(config.db_path().unwrap(), PathBuf::from("/custom/subs.redb"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config: Config = toml::from_str("[poll]\ninterval_secs = 0\n").unwrap();
        assert_eq!(config.poll.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_example_config_is_valid() {
        let example = Config::example_config();
        let parsed: Result<Config, _> = toml::from_str(&example);
        assert!(parsed.is_ok(), "Example config should be valid TOML");
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = "this is not valid [[ toml";
        let result: Result<Config, _> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_api_key() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.api.api_key = "key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.poll.interval_secs, 60);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.api.base_url, config.api.base_url);
    }
}
