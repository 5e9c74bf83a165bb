//! Configuration management for dooray-tools.
//!
//! Handles loading and saving configuration from TOML files. Config files
//! are stored in platform-specific locations:
//!
//! - **macOS/Linux**: `~/.config/dooray-tools/config.toml`
//! - **Windows**: `%APPDATA%\dooray-tools\config.toml`
//!
//! Credentials may also be supplied through the environment
//! (`DOORAY_BASE_URL`, `DOORAY_API_KEY`); environment values take precedence
//! over the file.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "dooray-tools";

/// Environment variable for the Dooray API base URL.
pub const ENV_BASE_URL: &str = "DOORAY_BASE_URL";

/// Environment variable for the Dooray API key.
pub const ENV_API_KEY: &str = "DOORAY_API_KEY";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Dooray API connection settings
    #[serde(default)]
    pub dooray: DoorayConfig,

    /// MCP server bind settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Dooray API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoorayConfig {
    /// API base URL (e.g. `https://api.dooray.com`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key for the `dooray-api` authorization scheme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// MCP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// MCP endpoint path
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    "/mcp".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// A missing file yields the default configuration; environment
    /// overrides are applied either way.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Config(format!("Failed to create {}: {}", dir.display(), e)))?;
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Apply `DOORAY_BASE_URL` / `DOORAY_API_KEY` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.is_empty() {
                self.dooray.base_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.is_empty() {
                self.dooray.api_key = Some(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.path, "/mcp");
        assert!(config.dooray.base_url.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.dooray.base_url = Some("https://api.dooray.com".to_string());
        config.server.port = 9000;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(
            loaded.dooray.base_url.as_deref(),
            Some("https://api.dooray.com")
        );
        assert_eq!(loaded.server.port, 9000);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dooray]\nbase_url = \"https://api.dooray.com\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(
            loaded.dooray.base_url.as_deref(),
            Some("https://api.dooray.com")
        );
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(Error::Config(_))
        ));
    }
}
