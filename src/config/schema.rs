//! Configuration schema, resolution, and persistence.

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Top-level configuration for the stagehand client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Resolved path of the config file. Computed at load time.
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

/// Endpoints for the external conversation services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Base URL for the catalog and chat HTTP endpoints.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Duplex channel endpoint. Derived from `base_url` when unset.
    #[serde(default)]
    pub channel_url: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            channel_url: None,
        }
    }
}

impl ServicesConfig {
    /// The channel endpoint: the configured one, or the base URL with its
    /// scheme swapped to ws(s) and `/ws` appended.
    pub fn channel_endpoint(&self) -> String {
        if let Some(url) = &self.channel_url {
            return url.trim_end_matches('/').to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let swapped = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!("{swapped}/ws")
    }
}

/// Chat behavior defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Agent preselected by `stagehand chat` when no `--agent` is given.
    #[serde(default)]
    pub default_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        Self {
            config_path: home.join(".stagehand").join("config.toml"),
            services: ServicesConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

fn resolve_config_dir(override_dir: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        let dir = dir.trim();
        if !dir.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(dir).into_owned()));
        }
    }

    if let Ok(dir) = std::env::var("STAGEHAND_CONFIG_DIR") {
        let dir = dir.trim();
        if !dir.is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(dir).into_owned()));
        }
    }

    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".stagehand"))
}

impl Config {
    /// Load configuration from the resolved config directory, falling back
    /// to defaults when no file exists. Resolution order: explicit
    /// override, `STAGEHAND_CONFIG_DIR`, `~/.stagehand`.
    pub async fn load(override_dir: Option<&str>) -> Result<Self> {
        let dir = resolve_config_dir(override_dir)?;
        let config_path = dir.join("config.toml");

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.config_path = config_path;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_base_url_override(std::env::var("STAGEHAND_BASE_URL").ok());
    }

    fn apply_base_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value {
            let url = url.trim();
            if !url.is_empty() {
                self.services.base_url = url.to_string();
            }
        }
    }

    /// Write the configuration back to its config path.
    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;

        fs::write(&self.config_path, toml_str)
            .await
            .with_context(|| {
                format!("Failed to write config file: {}", self.config_path.display())
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_endpoint_derives_from_base_url() {
        let services = ServicesConfig {
            base_url: "http://localhost:8000".to_string(),
            channel_url: None,
        };
        assert_eq!(services.channel_endpoint(), "ws://localhost:8000/ws");

        let services = ServicesConfig {
            base_url: "https://chat.example.com/".to_string(),
            channel_url: None,
        };
        assert_eq!(services.channel_endpoint(), "wss://chat.example.com/ws");
    }

    #[test]
    fn explicit_channel_url_wins() {
        let services = ServicesConfig {
            base_url: "http://localhost:8000".to_string(),
            channel_url: Some("ws://other:9000/channels/".to_string()),
        };
        assert_eq!(services.channel_endpoint(), "ws://other:9000/channels");
    }

    #[tokio::test]
    async fn load_returns_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().to_str()).await.unwrap();
        assert_eq!(config.services.base_url, default_base_url());
        assert_eq!(config.config_path, dir.path().join("config.toml"));
        assert!(config.chat.default_agent.is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load(dir.path().to_str()).await.unwrap();
        config.services.base_url = "http://pipeline:9999".to_string();
        config.chat.default_agent = Some("a1".to_string());
        config.save().await.unwrap();

        let loaded = Config::load(dir.path().to_str()).await.unwrap();
        assert_eq!(loaded.services.base_url, "http://pipeline:9999");
        assert_eq!(loaded.chat.default_agent.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn malformed_config_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "services = 42").unwrap();
        assert!(Config::load(dir.path().to_str()).await.is_err());
    }

    #[test]
    fn base_url_override_replaces_configured_value() {
        let mut config = Config::default();
        config.apply_base_url_override(Some("http://overridden:1234".to_string()));
        assert_eq!(config.services.base_url, "http://overridden:1234");

        config.apply_base_url_override(Some("  ".to_string()));
        assert_eq!(config.services.base_url, "http://overridden:1234");

        config.apply_base_url_override(None);
        assert_eq!(config.services.base_url, "http://overridden:1234");
    }
}
