//! Built-in `system.health` producer
//!
//! Publishes the agent's own liveness on the bus at a fixed interval so a
//! client subscribed to `system.health` sees regular traffic even when no
//! monitor has anything to report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventBus, EventType};
use crate::socket_server::ConnectionRegistry;

/// Payload of a heartbeat event
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub active_connections: usize,
    pub max_connections: usize,
    pub version: &'static str,
}

impl HealthReport {
    pub fn collect(started: Instant, registry: &ConnectionRegistry) -> Self {
        Self {
            status: "ok",
            uptime_secs: started.elapsed().as_secs(),
            active_connections: registry.count(),
            max_connections: registry.max_connections(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Spawn the heartbeat task. It stops when `shutdown` is cancelled.
pub fn spawn_heartbeat(
    bus: EventBus,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let started = Instant::now();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = HealthReport::collect(started, &registry);
            let payload = match serde_json::to_value(&report) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("failed to encode health report: {}", e);
                    continue;
                }
            };
            let delivered = bus.publish(Event::new(EventType::SystemHealth, payload));
            tracing::trace!(delivered, "heartbeat published");
        }

        tracing::debug!("heartbeat stopped");
    })
}
