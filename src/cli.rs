//! Command-line arguments for the agent daemon
//!
//! Flags override values from the configuration file; each flag can also be
//! supplied through a `STORMON_*` environment variable.

use clap::Parser;
use std::path::PathBuf;

use crate::config::AgentConfig;
use crate::error::Result;

/// Storage server monitoring agent
#[derive(Parser, Debug, Default)]
#[command(name = "stormon-daemon")]
#[command(about = "Streams storage server events to WebSocket clients")]
#[command(version)]
pub struct DaemonArgs {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "STORMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "STORMON_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "STORMON_PORT")]
    pub port: Option<u16>,

    /// Maximum concurrent WebSocket connections
    #[arg(long, env = "STORMON_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,

    /// Control messages allowed per connection per minute
    #[arg(long, env = "STORMON_MESSAGES_PER_MINUTE")]
    pub messages_per_minute: Option<u32>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "STORMON_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl DaemonArgs {
    /// Load the configuration file and apply flag overrides on top
    pub fn resolve_config(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::load_from(path)?,
            None => AgentConfig::load()?,
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut AgentConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max) = self.max_connections {
            config.limits.max_connections = max;
        }
        if let Some(rate) = self.messages_per_minute {
            config.limits.messages_per_minute = rate;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}
