//! Stormon: storage server monitoring agent
//!
//! The agent exposes live device and service state to browsers and tools on
//! the local network. Internal monitors publish typed events on an
//! in-process [`EventBus`]; the [`socket_server`] fans them out over
//! WebSocket to the clients subscribed to each topic.
//!
//! # Example
//!
//! ```ignore
//! use stormon::{AgentConfig, EventBus, EventType, SocketServer};
//!
//! let config = AgentConfig::load()?;
//! let bus = EventBus::with_buffer(config.limits.bus_buffer);
//! let server = SocketServer::new(&config, bus.clone());
//!
//! let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//! tokio::spawn(server.serve(listener));
//!
//! bus.publish_raw("array.status", serde_json::json!({"state": "started"}))?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod socket_server;

// Re-export commonly used types
pub use config::AgentConfig;
pub use error::{Result, StormonError};
pub use events::{Event, EventBus, EventType, Subscription};
pub use socket_server::{ConnectionRegistry, SocketServer};
