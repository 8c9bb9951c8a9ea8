//! Configuration management
//!
//! Handles:
//! - Pools API endpoint and paging
//! - Poll interval
//! - Audio alert preferences
//! - Credential storage backend

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "LBWATCH_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub poll: PollConfig,
    pub alerts: AlertConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub per_page: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub muted: bool,
    pub player: PlayerKind,
    /// Program used when `player = "command"`
    pub command: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Platform audio player if one is known, terminal bell otherwise
    Auto,
    Command,
    Bell,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cloudflare.com/client/v4".to_string(),
            per_page: 50,
            request_timeout_secs: 30,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            muted: false,
            player: PlayerKind::Auto,
            command: None,
            args: Vec::new(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs.max(1))
    }
}

impl AppConfig {
    /// Load config from `path`, or from the OS-specific location when `None`
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("Invalid config file {}", config_path.display()))?;
            Ok(config)
        } else {
            // First run - defaults
            Ok(Self::default())
        }
    }

    /// Save config to `path`, or to the OS-specific location when `None`
    pub async fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_file_path()?,
        };

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        Ok(())
    }

    /// Config file path, honouring `LBWATCH_CONFIG`
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(custom) = std::env::var(CONFIG_ENV) {
            if !custom.trim().is_empty() {
                return Ok(PathBuf::from(custom));
            }
        }

        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("lbwatch");
        path.push("config.toml");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.per_page, 50);
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.alerts.player, PlayerKind::Auto);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert!(!config.alerts.muted);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [poll]
            interval_secs = 30

            [alerts]
            muted = true
            player = "bell"
            "#,
        )
        .unwrap();

        assert_eq!(config.poll.interval_secs, 30);
        assert!(config.alerts.muted);
        assert_eq!(config.alerts.player, PlayerKind::Bell);
        assert_eq!(config.api, ApiConfig::default());
    }

    #[test]
    fn test_interval_never_zero() {
        let poll = PollConfig { interval_secs: 0 };
        assert_eq!(poll.interval(), std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lbwatch").join("config.toml");

        let mut config = AppConfig::default();
        config.api.base_url = "http://127.0.0.1:9999".to_string();
        config.storage.backend = StorageBackend::Keyring;
        config.save(Some(&path)).await.unwrap();

        let loaded = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load(Some(&dir.path().join("absent.toml")))
            .await
            .unwrap();
        assert_eq!(loaded, AppConfig::default());
    }
}
