//! Configuration management

use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;
use crate::relay::DeliveryPolicy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub delivery: DeliveryConfig,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port serving both the chat page and WebSocket upgrades
    pub port: u16,

    /// Largest inbound WebSocket message accepted, in bytes
    pub max_message_size: usize,

    /// Chat page served on `GET /`; the built-in page is used when unset
    pub page: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            page: None,
        }
    }
}

/// Outbound delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Longest a single send may wait on a slow client, in milliseconds
    pub send_timeout_ms: u64,

    /// Frames buffered per connection before sends start waiting
    pub outbound_queue: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5000,
            outbound_queue: 256,
        }
    }
}

impl DeliveryConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn policy(&self) -> DeliveryPolicy {
        DeliveryPolicy::new(self.send_timeout())
    }
}

impl Config {
    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatrelay")
            .join("config.toml")
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.max_message_size == 0 {
            bail!("server.max_message_size must be greater than zero");
        }
        if self.delivery.outbound_queue == 0 {
            bail!("delivery.outbound_queue must be greater than zero");
        }
        if self.delivery.send_timeout_ms == 0 {
            bail!("delivery.send_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    /// Address string handed to the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
