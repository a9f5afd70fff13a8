//! Connection registry and admission control
//!
//! The registry is the only place a connection can be admitted. Admission
//! and retirement take one registry-wide lock, so the connection count can
//! never exceed `max_connections`; at capacity a new connection is refused,
//! never queued.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StormonError};
use crate::socket_server::connection::{Connection, ConnectionId};

/// Registry of live connections
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    max_connections: usize,
    messages_per_minute: u32,
}

/// Diagnostic view of one live connection
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub id: String,
    pub client_ip: String,
    pub connected_at: String,
    pub subscriptions: Vec<String>,
    /// Seconds since the last frame from the client
    pub idle_secs: u64,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize, messages_per_minute: u32) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            max_connections,
            messages_per_minute,
        }
    }

    /// Admit a new connection, or refuse it when the registry is full.
    ///
    /// The returned lease retires the connection when dropped.
    pub fn admit(self: &Arc<Self>, client_ip: &str, cancel: CancellationToken) -> Result<ConnectionLease> {
        let mut connections = self.connections.lock();
        if connections.len() >= self.max_connections {
            tracing::warn!(
                client_ip,
                max = self.max_connections,
                "connection limit reached, refusing connection"
            );
            return Err(StormonError::CapacityExceeded {
                max: self.max_connections,
            });
        }

        let connection = Arc::new(Connection::new(client_ip, self.messages_per_minute, cancel));
        connections.insert(connection.id().to_string(), Arc::clone(&connection));
        tracing::debug!(
            conn_id = %connection.id(),
            active = connections.len(),
            "connection admitted"
        );

        Ok(ConnectionLease {
            registry: Arc::clone(self),
            connection,
        })
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn retire(&self, id: &str) -> bool {
        let removed = self.connections.lock().remove(id);
        match removed {
            Some(connection) => {
                connection.cancel();
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.lock().get(id).cloned()
    }

    /// Summaries of all live connections, oldest first
    pub fn snapshot(&self) -> Vec<ConnectionSummary> {
        let connections: Vec<Arc<Connection>> = self.connections.lock().values().cloned().collect();
        let mut summaries: Vec<ConnectionSummary> = connections
            .iter()
            .map(|c| ConnectionSummary {
                id: c.id().to_string(),
                client_ip: c.client_ip().to_string(),
                connected_at: c.connected_at().to_rfc3339(),
                subscriptions: c.subscriptions().iter().map(|t| t.as_str().to_string()).collect(),
                idle_secs: c.idle_for().as_secs(),
            })
            .collect();
        summaries.sort_by(|a, b| a.connected_at.cmp(&b.connected_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }
}

/// Proof of admission. Dropping it retires the connection.
pub struct ConnectionLease {
    registry: Arc<ConnectionRegistry>,
    connection: Arc<Connection>,
}

impl ConnectionLease {
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.registry.retire(self.connection.id());
    }
}
