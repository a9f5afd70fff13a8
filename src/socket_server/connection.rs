//! WebSocket connection handler
//!
//! Per-connection state plus the session that drives it. Each admitted
//! socket runs three tasks sharing one [`Connection`]:
//!
//! - the read loop (this task), feeding text frames to the [`MessageRouter`]
//! - the [`EventBroadcaster`], forwarding subscribed bus events
//! - the writer, the only owner of the socket's write half
//!
//! Replies and events both go through one bounded outbound queue drained
//! by the writer, so the socket never has two concurrent writers. Any of
//! the three ending with an error cancels the connection's scope, which
//! stops the other two.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StormonError};
use crate::events::EventType;
use crate::socket_server::broadcaster::EventBroadcaster;
use crate::socket_server::handshake;
use crate::socket_server::protocol::OutboundFrame;
use crate::socket_server::rate_limit::{FixedWindowLimiter, RateDecision};
use crate::socket_server::registry::ConnectionLease;
use crate::socket_server::router::MessageRouter;
use crate::socket_server::server::SocketServer;

/// Opaque connection identifier
pub type ConnectionId = String;

/// How long the writer waits for the close handshake before giving up
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Shared state for a single connection
pub struct Connection {
    id: ConnectionId,
    client_ip: String,
    connected_at: DateTime<Utc>,
    subscriptions: RwLock<HashSet<EventType>>,
    limiter: Mutex<FixedWindowLimiter>,
    last_activity: Mutex<Instant>,
    cancel: CancellationToken,
}

impl Connection {
    pub fn new(client_ip: impl Into<String>, messages_per_minute: u32, cancel: CancellationToken) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("conn_{}", &uuid[..12]),
            client_ip: client_ip.into(),
            connected_at: Utc::now(),
            subscriptions: RwLock::new(HashSet::new()),
            limiter: Mutex::new(FixedWindowLimiter::new(messages_per_minute)),
            last_activity: Mutex::new(Instant::now()),
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Add topics to the subscription set; already-held topics are unchanged
    pub fn subscribe(&self, topics: impl IntoIterator<Item = EventType>) {
        let mut subs = self.subscriptions.write();
        subs.extend(topics);
    }

    /// Remove topics from the subscription set; topics not held are ignored
    pub fn unsubscribe(&self, topics: impl IntoIterator<Item = EventType>) {
        let mut subs = self.subscriptions.write();
        for topic in topics {
            subs.remove(&topic);
        }
    }

    pub fn is_subscribed(&self, topic: EventType) -> bool {
        self.subscriptions.read().contains(&topic)
    }

    /// Current subscriptions in catalog order
    pub fn subscriptions(&self) -> Vec<EventType> {
        let mut subs: Vec<EventType> = self.subscriptions.read().iter().copied().collect();
        subs.sort();
        subs
    }

    /// Count one inbound data frame against the rate limit.
    ///
    /// Exceeding the limit is terminal for the connection.
    pub fn record_message(&self, now: Instant) -> Result<u32> {
        let decision = self.limiter.lock().record(now);
        match decision {
            RateDecision::Allowed(count) => Ok(count),
            RateDecision::Exceeded(count) => {
                tracing::warn!(
                    conn_id = %self.id,
                    client_ip = %self.client_ip,
                    count,
                    "message rate limit exceeded, closing connection"
                );
                Err(StormonError::RateLimited {
                    client_ip: self.client_ip.clone(),
                    count,
                })
            }
        }
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Handle a single accepted TCP stream: screen and upgrade it, then run the
/// session until either side ends it.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, server: Arc<SocketServer>) {
    let settings = server.settings();
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(settings.max_message_size);
    ws_config.max_frame_size = Some(settings.max_message_size);

    let mut lease: Option<ConnectionLease> = None;
    let callback = |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
        lease = Some(handshake::screen(req, Some(peer), &server)?);
        Ok(resp)
    };

    let ws = match accept_hdr_async_with_config(stream, callback, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %peer, "WebSocket handshake not completed: {}", e);
            return;
        }
    };

    let Some(lease) = lease else {
        return;
    };

    run_session(ws, lease, &server).await;
}

/// Drive an upgraded socket until it closes, errors, or is cancelled.
///
/// The lease is dropped on return, which retires the connection.
pub async fn run_session<S>(ws: WebSocketStream<S>, lease: ConnectionLease, server: &SocketServer)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let conn = Arc::clone(lease.connection());
    let cancel = conn.cancel_token();
    tracing::info!(conn_id = %conn.id(), client_ip = %conn.client_ip(), "connection opened");

    let (sink, mut stream) = ws.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(server.settings().outbound_queue);

    // Subscribe to the bus before reading, so nothing published after an
    // acknowledged subscribe can be missed.
    let broadcaster = EventBroadcaster::new(Arc::clone(&conn), server.bus(), outbound_tx.clone());
    let broadcast_task = tokio::spawn(broadcaster.run());
    let writer_task = tokio::spawn(write_loop(sink, outbound_rx, Arc::clone(&conn)));

    let router = MessageRouter::new(Arc::clone(&conn), outbound_tx);

    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = stream.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                conn.touch();
                if let Err(e) = router.route(&text).await {
                    // Terminal errors are logged where they are raised
                    if e.is_terminal() {
                        tracing::debug!(conn_id = %conn.id(), "ending connection: {}", e);
                        break;
                    }
                    tracing::warn!(conn_id = %conn.id(), "control message failed: {}", e);
                }
            }
            Some(Ok(Message::Binary(_))) => {
                conn.touch();
                if let Err(e) = conn.record_message(Instant::now()) {
                    tracing::debug!(conn_id = %conn.id(), "ending connection: {}", e);
                    break;
                }
                tracing::debug!(conn_id = %conn.id(), "ignoring binary frame");
            }
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!(conn_id = %conn.id(), "client closed");
                break;
            }
            Some(Ok(_)) => conn.touch(),
            Some(Err(e)) => {
                tracing::warn!(conn_id = %conn.id(), "WebSocket read error: {}", e);
                break;
            }
        }
    }

    conn.cancel();
    drop(router);
    let _ = broadcast_task.await;
    let _ = writer_task.await;

    drop(lease);
    tracing::info!(
        conn_id = %conn.id(),
        client_ip = %conn.client_ip(),
        active = server.registry().count(),
        "connection closed"
    );
}

/// Drain the outbound queue into the socket. Sole writer for the connection.
async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    conn: Arc<Connection>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let cancel = conn.cancel_token();

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                // Don't break the connection on a serialization error
                tracing::error!(conn_id = %conn.id(), "failed to serialize frame: {}", e);
                continue;
            }
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = sink.send(Message::Text(text)) => sent,
        };
        if let Err(e) = sent {
            tracing::warn!(conn_id = %conn.id(), "WebSocket write failed: {}", e);
            conn.cancel();
            return;
        }
    }

    let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
}
