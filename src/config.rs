use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::smoother::DEFAULT_WINDOW_SIZE;

/// Internal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,
    pub port: u16,
    pub gemini_model: String,
    pub window_size: usize,
    pub temp_dir: PathBuf,
    pub frame_max_age_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            port: 5000,
            gemini_model: "gemini-1.5-flash".to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            temp_dir: PathBuf::from("temp"),
            frame_max_age_secs: 300,
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".emotion-mirror"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file or return default
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.window_size, 5);
        assert_eq!(config.frame_max_age_secs, 300);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            window_size: 9,
            port: 8080,
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.window_size, 9);
        assert_eq!(parsed.port, 8080);
        assert_eq!(parsed.gemini_model, config.gemini_model);
    }
}
