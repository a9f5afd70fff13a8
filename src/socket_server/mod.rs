//! Stormon Socket Server
//!
//! Real-time event distribution for the monitoring agent: clients open a
//! WebSocket, pick topics, and receive the events internal monitors publish
//! on the [`EventBus`](crate::events::EventBus).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     STORMON SOCKET SERVER (stormon-daemon)              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  TCP accept ──► handshake::screen                                       │
//! │                   path ─► origin ─► ConnectionRegistry::admit           │
//! │                   (404)   (403)     (503 when full)                     │
//! │                                                                         │
//! │  ┌──────────────────────── per connection ──────────────────────────┐  │
//! │  │                                                                   │  │
//! │  │  read loop ──► MessageRouter ──┐                                  │  │
//! │  │                  rate limit     │                                  │  │
//! │  │                  subscriptions  ├──► outbound queue ──► writer ──► socket
//! │  │  EventBus ──► EventBroadcaster ─┘     (bounded)       (sole owner)│  │
//! │  │                 filter by subscription set                       │  │
//! │  │                                                                   │  │
//! │  │  shared: Connection { subscriptions, limiter, cancel scope }      │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol
//!
//! All messages are JSON over WebSocket:
//!
//! ```json
//! // Client -> Server
//! {"type": "ping"}
//! {"type": "subscribe", "channels": ["system.stats", "docker.events"]}
//! {"type": "unsubscribe", "channels": ["docker.events"]}
//!
//! // Server -> Client
//! {"type": "pong", "timestamp": "..."}
//! {"type": "subscription_ack", "channels": [...], "status": "subscribed", "timestamp": "..."}
//! {"type": "unsubscription_ack", "channels": [...], "status": "unsubscribed", "timestamp": "..."}
//! {"event_type": "array.status", "data": {...}, "timestamp": "..."}
//! ```

pub mod broadcaster;
pub mod connection;
pub mod handshake;
pub mod origin;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod router;
pub mod server;

pub use connection::{handle_connection, Connection, ConnectionId};
pub use origin::is_origin_allowed;
pub use protocol::{ClientMessage, EventFrame, OutboundFrame, ServerMessage};
pub use registry::{ConnectionLease, ConnectionRegistry, ConnectionSummary};
pub use server::SocketServer;
