//! Configuration management

use anyhow::{Context, Result};
use parley_broadcaster::RoomConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// WebSocket listen address
    pub bind_addr: SocketAddr,

    /// Room settings (`[room]` table)
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5002)),
            room: RoomConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            toml::from_str::<ServerConfig>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            config
        };

        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.room.validate().context("Invalid [room] configuration")
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("com.parley.daemon")
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("parley")
        };

        config_dir.join("config.toml")
    }
}
