//! Socket server protocol message types
//!
//! Defines the JSON message format for client-server communication.
//!
//! Inbound frames are decoded in two steps: the raw JSON is inspected for a
//! `type` discriminator first, so frames without one and frames with a type
//! this server does not know can be told apart from malformed known
//! messages.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StormonError};
use crate::events::Event;

/// Client-to-server control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness check; always answered with a pong
    Ping,
    /// Add topics to the connection's subscription set.
    /// Non-string entries are skipped.
    Subscribe { channels: Vec<serde_json::Value> },
    /// Remove topics from the connection's subscription set
    Unsubscribe { channels: Vec<serde_json::Value> },
}

const KNOWN_TYPES: [&str; 3] = ["ping", "subscribe", "unsubscribe"];

/// Result of decoding one inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Control(ClientMessage),
    /// JSON without a `type` field; ignored silently
    Untyped,
    /// A `type` this server does not handle
    Unknown(String),
}

/// Decode an inbound text frame.
///
/// Malformed JSON, a non-string `type`, or a known message with invalid
/// fields (e.g. `channels` that is not an array) is a protocol error.
pub fn decode_frame(text: &str) -> Result<InboundFrame> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| StormonError::Protocol {
            message: format!("invalid JSON: {}", e),
        })?;

    let Some(kind) = value.get("type") else {
        return Ok(InboundFrame::Untyped);
    };
    let kind = kind.as_str().ok_or_else(|| StormonError::Protocol {
        message: "message type must be a string".to_string(),
    })?;

    if !KNOWN_TYPES.contains(&kind) {
        return Ok(InboundFrame::Unknown(kind.to_string()));
    }

    let kind = kind.to_string();
    serde_json::from_value(value)
        .map(InboundFrame::Control)
        .map_err(|e| StormonError::Protocol {
            message: format!("invalid {} message: {}", kind, e),
        })
}

/// Keep the string entries of a `channels` array, in order
pub fn channel_names(channels: &[serde_json::Value]) -> Vec<String> {
    channels
        .iter()
        .filter_map(|c| c.as_str().map(str::to_string))
        .collect()
}

/// Server-to-client control reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong {
        timestamp: String,
    },
    SubscriptionAck {
        channels: Vec<String>,
        status: String,
        timestamp: String,
    },
    UnsubscriptionAck {
        channels: Vec<String>,
        status: String,
        timestamp: String,
    },
}

impl ServerMessage {
    pub fn pong() -> Self {
        Self::Pong {
            timestamp: now_rfc3339(),
        }
    }

    pub fn subscription_ack(channels: Vec<String>) -> Self {
        Self::SubscriptionAck {
            channels,
            status: "subscribed".to_string(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn unsubscription_ack(channels: Vec<String>) -> Self {
        Self::UnsubscriptionAck {
            channels,
            status: "unsubscribed".to_string(),
            timestamp: now_rfc3339(),
        }
    }
}

/// Event notification as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

impl From<&Event> for EventFrame {
    fn from(event: &Event) -> Self {
        Self {
            event_type: event.event_type.as_str().to_string(),
            data: event.payload.clone(),
            timestamp: event.timestamp.to_rfc3339(),
        }
    }
}

/// Anything queued for the connection's writer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Control(ServerMessage),
    Event(EventFrame),
}

impl OutboundFrame {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
