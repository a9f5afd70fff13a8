//! In-process server and client fixtures
//!
//! Each `TestServer` binds its own listener on `127.0.0.1:0`, so tests can
//! run in parallel. Dropping the server cancels its root scope.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use stormon::{AgentConfig, EventBus, SocketServer};

/// How long a client waits for a frame before treating it as absent
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Window used to assert that nothing arrives
pub const QUIET_WINDOW: Duration = Duration::from_millis(300);

pub struct TestServer {
    pub server: Arc<SocketServer>,
    pub bus: EventBus,
    pub addr: SocketAddr,
}

impl TestServer {
    /// Server with default limits
    pub async fn start() -> Self {
        Self::with_config(AgentConfig::default()).await
    }

    /// Server with custom connection and rate limits
    pub async fn with_limits(max_connections: usize, messages_per_minute: u32) -> Self {
        let mut config = AgentConfig::default();
        config.limits.max_connections = max_connections;
        config.limits.messages_per_minute = messages_per_minute;
        Self::with_config(config).await
    }

    pub async fn with_config(config: AgentConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let bus = EventBus::new();
        let server = SocketServer::new(&config, bus.clone());
        tokio::spawn(server.clone().serve(listener));

        Self { server, bus, addr }
    }

    pub fn url(&self) -> String {
        format!("ws://{}{}", self.addr, self.server.settings().path)
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn active(&self) -> usize {
        self.server.registry().count()
    }

    /// Connect without an Origin header and expect success
    pub async fn connect(&self) -> TestClient {
        self.try_connect(&self.url(), None)
            .await
            .expect("WebSocket connect failed")
    }

    pub async fn connect_with_origin(&self, origin: &str) -> Result<TestClient, tungstenite::Error> {
        self.try_connect(&self.url(), Some(origin)).await
    }

    pub async fn try_connect(
        &self,
        url: &str,
        origin: Option<&str>,
    ) -> Result<TestClient, tungstenite::Error> {
        let mut request = url.into_client_request()?;
        if let Some(origin) = origin {
            request
                .headers_mut()
                .insert("Origin", HeaderValue::from_str(origin).expect("Invalid origin header"));
        }
        let (ws, _response) = connect_async(request).await?;
        Ok(TestClient { ws })
    }

    /// Poll the registry until it holds `expected` connections
    pub async fn wait_for_active(&self, expected: usize) -> bool {
        for _ in 0..100 {
            if self.active() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// HTTP status of a refused handshake, if that is what the error is
pub fn refusal_status(err: &tungstenite::Error) -> Option<u16> {
    match err {
        tungstenite::Error::Http(response) => Some(response.status().as_u16()),
        _ => None,
    }
}

pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string()))
            .await
            .expect("Failed to send frame");
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), tungstenite::Error> {
        self.ws.send(Message::Text(text.to_string())).await
    }

    pub async fn send_binary(&mut self, bytes: &[u8]) -> Result<(), tungstenite::Error> {
        self.ws.send(Message::Binary(bytes.to_vec())).await
    }

    /// Next JSON text frame, or `None` on close, error, or timeout
    pub async fn recv_json_within(&mut self, wait: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let msg = tokio::time::timeout_at(deadline, self.ws.next()).await.ok()??;
            match msg {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).expect("Server sent invalid JSON"))
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                _ => return None,
            }
        }
    }

    pub async fn recv_json(&mut self) -> Option<Value> {
        self.recv_json_within(RECV_TIMEOUT).await
    }

    /// Assert-friendly: true if no text frame arrives in the quiet window
    pub async fn is_quiet(&mut self) -> bool {
        self.recv_json_within(QUIET_WINDOW).await.is_none()
    }

    pub async fn ping(&mut self) -> Value {
        self.send_json(serde_json::json!({"type": "ping"})).await;
        self.recv_json().await.expect("No pong received")
    }

    pub async fn subscribe(&mut self, channels: &[&str]) -> Value {
        self.send_json(serde_json::json!({"type": "subscribe", "channels": channels}))
            .await;
        self.recv_json().await.expect("No subscription ack received")
    }

    pub async fn unsubscribe(&mut self, channels: &[&str]) -> Value {
        self.send_json(serde_json::json!({"type": "unsubscribe", "channels": channels}))
            .await;
        self.recv_json().await.expect("No unsubscription ack received")
    }

    /// True once the server has closed the stream (close frame, EOF, or error)
    pub async fn closed_by_server(&mut self) -> bool {
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return false,
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
