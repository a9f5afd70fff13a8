//! Inbound control message routing
//!
//! Each text frame is counted against the connection's rate limit, decoded,
//! and applied to the connection's subscription set. Replies go to the
//! outbound queue, never directly to the socket.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::error::{Result, StormonError};
use crate::events::EventType;
use crate::socket_server::connection::Connection;
use crate::socket_server::protocol::{
    channel_names, decode_frame, ClientMessage, InboundFrame, OutboundFrame, ServerMessage,
};

pub struct MessageRouter {
    conn: Arc<Connection>,
    outbound: mpsc::Sender<OutboundFrame>,
}

impl MessageRouter {
    pub fn new(conn: Arc<Connection>, outbound: mpsc::Sender<OutboundFrame>) -> Self {
        Self { conn, outbound }
    }

    /// Handle one inbound text frame.
    ///
    /// Protocol errors are logged and the frame is dropped. Errors returned
    /// here (rate limit exceeded, writer gone) are already logged and report
    /// [`is_terminal`](StormonError::is_terminal).
    pub async fn route(&self, text: &str) -> Result<()> {
        self.conn.record_message(Instant::now())?;

        let msg = match decode_frame(text) {
            Ok(InboundFrame::Control(msg)) => msg,
            Ok(InboundFrame::Untyped) => return Ok(()),
            Ok(InboundFrame::Unknown(kind)) => {
                tracing::info!(conn_id = %self.conn.id(), kind = %kind, "ignoring unknown message type");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(
                    conn_id = %self.conn.id(),
                    client_ip = %self.conn.client_ip(),
                    "ignoring control message: {}",
                    e
                );
                return Ok(());
            }
        };

        match msg {
            ClientMessage::Ping => self.reply(ServerMessage::pong()).await,

            ClientMessage::Subscribe { channels } => {
                let names = channel_names(&channels);
                self.conn.subscribe(names.iter().filter_map(|n| EventType::parse(n)));
                tracing::debug!(conn_id = %self.conn.id(), channels = ?names, "subscribed");
                self.reply(ServerMessage::subscription_ack(names)).await
            }

            ClientMessage::Unsubscribe { channels } => {
                let names = channel_names(&channels);
                self.conn.unsubscribe(names.iter().filter_map(|n| EventType::parse(n)));
                tracing::debug!(conn_id = %self.conn.id(), channels = ?names, "unsubscribed");
                self.reply(ServerMessage::unsubscription_ack(names)).await
            }
        }
    }

    async fn reply(&self, msg: ServerMessage) -> Result<()> {
        self.outbound
            .send(OutboundFrame::Control(msg))
            .await
            .map_err(|_| StormonError::OutboundClosed {
                conn_id: self.conn.id().to_string(),
            })
    }
}
