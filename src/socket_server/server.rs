//! Listener and shared server state

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::socket_server::connection::handle_connection;
use crate::socket_server::registry::ConnectionRegistry;

/// Per-session settings taken from the agent configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Upgrade endpoint path
    pub path: String,
    pub max_message_size: usize,
    pub outbound_queue: usize,
}

/// State shared by every connection: registry, bus, and the root
/// cancellation scope.
pub struct SocketServer {
    registry: Arc<ConnectionRegistry>,
    bus: EventBus,
    settings: SessionSettings,
    shutdown: CancellationToken,
}

impl SocketServer {
    pub fn new(config: &AgentConfig, bus: EventBus) -> Arc<Self> {
        let limits = &config.limits;
        Arc::new(Self {
            registry: Arc::new(ConnectionRegistry::new(
                limits.max_connections,
                limits.messages_per_minute,
            )),
            bus,
            settings: SessionSettings {
                path: config.server.path.clone(),
                max_message_size: limits.max_message_size,
                outbound_queue: limits.outbound_queue,
            },
            shutdown: CancellationToken::new(),
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Root scope; every connection runs under a child of it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting and cancel every live connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Accept connections until shutdown
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!("stormon listening on ws://{}{}", addr, self.settings.path);

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(peer = %peer, "accepted TCP connection");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        handle_connection(stream, peer, server).await;
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }

        tracing::info!(active = self.registry.count(), "listener stopped");
        Ok(())
    }
}
