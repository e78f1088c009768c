use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub room: RoomConfig,
    pub api: ApiConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Endpoint returning `{ token, url, room }` as JSON.
    pub token_url: String,
    /// Unset means wait for as long as the backend takes.
    pub token_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub adaptive_stream: bool,
    pub dynacast: bool,
    /// Delay between an implicit connect and enabling the microphone.
    pub microphone_settle_ms: u64,
    /// Speaker label for data messages without a sender.
    pub agent_label: String,
    /// Identity of the agent in the loopback room.
    pub agent_identity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// How many transcript lines the console shows.
    pub transcript_lines: usize,
    pub status_bar: StatusBarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    pub disconnected_text: String,
    pub connected_text: String,
    pub listening_text: String,
    pub disconnected_tooltip: String,
    pub connected_tooltip: String,
    pub listening_tooltip: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            token_url: "http://localhost:8000/token".to_string(),
            token_timeout_seconds: None,
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            adaptive_stream: true,
            dynacast: true,
            microphone_settle_ms: 500,
            agent_label: "Agent".to_string(),
            agent_identity: "agent".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3838,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            transcript_lines: 20,
            status_bar: StatusBarConfig::default(),
        }
    }
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self {
            disconnected_text: "○".to_string(),
            connected_text: "●".to_string(),
            listening_text: "◉".to_string(),
            disconnected_tooltip: "Not connected".to_string(),
            connected_tooltip: "Connected, microphone off".to_string(),
            listening_tooltip: "Listening...".to_string(),
        }
    }
}

impl Config {
    /// Loads from `path`, or from the default location when `None`. A missing
    /// file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
