//! Error types and exit codes for stormon

use std::process::ExitCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Main error type for stormon operations
#[derive(Error, Debug)]
pub enum StormonError {
    #[error("Origin not allowed: {origin}")]
    OriginRejected { origin: String },

    #[error("Connection limit reached ({max} active)")]
    CapacityExceeded { max: usize },

    #[error("Rate limit exceeded for {client_ip}: {count} messages in the current window")]
    RateLimited { client_ip: String, count: u32 },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Outbound queue closed for connection {conn_id}")]
    OutboundClosed { conn_id: String },

    #[error("Unknown event type: {topic}")]
    UnknownEventType { topic: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StormonError {
    /// Whether this error ends the connection it was raised on.
    ///
    /// Protocol and bus errors are scoped to one request; rate-limit
    /// violations and transport failures end the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::OutboundClosed { .. } | Self::WebSocket(_) | Self::Io(_)
        )
    }

    /// Convert error to a daemon exit code:
    /// - 1: IO / transport error
    /// - 2: Configuration error
    /// - 3: Anything else
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) | Self::WebSocket(_) => ExitCode::from(1),
            Self::ConfigError { .. } => ExitCode::from(2),
            _ => ExitCode::from(3),
        }
    }
}

/// Result type alias for stormon operations
pub type Result<T> = std::result::Result<T, StormonError>;
