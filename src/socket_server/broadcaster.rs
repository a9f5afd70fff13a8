//! Per-connection event forwarding
//!
//! The broadcaster subscribes to the whole topic catalog once and filters
//! locally against the connection's subscription set. Subscribe and
//! unsubscribe requests therefore take effect without touching the bus.
//!
//! Membership is checked when an event is taken off the bus channel, so an
//! event published while a subscription change is in flight may or may not
//! be delivered. Delivery is best effort: events are not queued for
//! disconnected clients and are never replayed.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::events::{EventBus, EventType, Subscription};
use crate::socket_server::connection::Connection;
use crate::socket_server::protocol::{EventFrame, OutboundFrame};

pub struct EventBroadcaster {
    conn: Arc<Connection>,
    subscription: Subscription,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl EventBroadcaster {
    /// Subscribe to every topic on the bus on behalf of `conn`
    pub fn new(conn: Arc<Connection>, bus: &EventBus, outbound: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            conn,
            subscription: bus.subscribe(&EventType::ALL),
            outbound,
        }
    }

    /// Forward subscribed events until the connection is cancelled or the
    /// writer goes away. The bus subscription is released on return.
    pub async fn run(mut self) {
        let cancel = self.conn.cancel_token();

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.subscription.recv() => match event {
                    Some(event) => event,
                    None => {
                        tracing::debug!(conn_id = %self.conn.id(), "event bus closed");
                        break;
                    }
                },
            };

            if !self.conn.is_subscribed(event.event_type) {
                continue;
            }

            let frame = OutboundFrame::Event(EventFrame::from(&event));
            let queued = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                queued = self.outbound.send(frame) => queued,
            };
            if queued.is_err() {
                tracing::warn!(
                    conn_id = %self.conn.id(),
                    event_type = %event.event_type,
                    "writer gone, stopping event delivery"
                );
                self.conn.cancel();
                break;
            }
        }
    }
}
