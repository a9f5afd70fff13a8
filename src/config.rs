//! Agent configuration management.
//!
//! Handles the stormon configuration file at:
//! - Linux: ~/.config/stormon/config.toml
//! - macOS: ~/Library/Application Support/stormon/config.toml
//!
//! Every field has a default, so a missing file or a partial file is valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StormonError};

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AgentConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Connection and message limits for the socket layer
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Built-in health producer
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upgrade endpoint path
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    "/ws".to_string()
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

/// Socket layer limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Hard cap on concurrent connections; admission beyond it is refused
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Largest inbound message the transport will read, in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Control messages allowed per connection per fixed one-minute window
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,

    /// Pending outbound frames per connection
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Pending bus events per connection
    #[serde(default = "default_bus_buffer")]
    pub bus_buffer: usize,
}

fn default_max_connections() -> usize {
    50
}

fn default_max_message_size() -> usize {
    1024 * 1024
}

fn default_messages_per_minute() -> u32 {
    100
}

fn default_outbound_queue() -> usize {
    256
}

fn default_bus_buffer() -> usize {
    crate::events::bus::DEFAULT_BUS_BUFFER
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_message_size: default_max_message_size(),
            messages_per_minute: default_messages_per_minute(),
            outbound_queue: default_outbound_queue(),
            bus_buffer: default_bus_buffer(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Heartbeat producer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatConfig {
    /// Seconds between `system.health` events; 0 disables the producer
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    30
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl AgentConfig {
    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stormon").join("config.toml"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| StormonError::ConfigError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the socket layer cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.server.path.starts_with('/') {
            return Err(StormonError::ConfigError {
                message: format!("server.path must start with '/': {}", self.server.path),
            });
        }
        let limits = &self.limits;
        let zero = [
            ("limits.max_connections", limits.max_connections == 0),
            ("limits.max_message_size", limits.max_message_size == 0),
            ("limits.messages_per_minute", limits.messages_per_minute == 0),
            ("limits.outbound_queue", limits.outbound_queue == 0),
            ("limits.bus_buffer", limits.bus_buffer == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(StormonError::ConfigError {
                message: format!("{} must be greater than zero", name),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(StormonError::ConfigError {
                message: format!(
                    "logging.level must be one of {}: {}",
                    LOG_LEVELS.join(", "),
                    self.logging.level
                ),
            });
        }
        Ok(())
    }

    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
