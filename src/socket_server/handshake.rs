//! Upgrade request screening
//!
//! Runs inside the WebSocket handshake, before the 101 response is written:
//!
//! 1. the request path must be the configured endpoint (404 otherwise)
//! 2. the `Origin` header must pass [`check_origin`] (403 otherwise)
//! 3. the registry must have room (503 otherwise)
//!
//! A refused request never creates a connection.

use std::net::SocketAddr;

use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request};
use tokio_tungstenite::tungstenite::http::{header, HeaderMap, StatusCode};

use crate::socket_server::origin::check_origin;
use crate::socket_server::registry::ConnectionLease;
use crate::socket_server::server::SocketServer;

/// Screen an upgrade request and admit it into the registry
pub fn screen(
    req: &Request,
    peer: Option<SocketAddr>,
    server: &SocketServer,
) -> Result<ConnectionLease, ErrorResponse> {
    if req.uri().path() != server.settings().path {
        return Err(refusal(StatusCode::NOT_FOUND, "Not Found"));
    }

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or("<non-ascii>"));
    if check_origin(origin).is_err() {
        return Err(refusal(StatusCode::FORBIDDEN, "Origin not allowed"));
    }

    let client_ip = resolve_client_ip(req.headers(), peer);
    server
        .registry()
        .admit(&client_ip, server.shutdown_token().child_token())
        .map_err(|_| refusal(StatusCode::SERVICE_UNAVAILABLE, "Too many connections"))
}

/// Client address for logging and rate-limit attribution.
///
/// First entry of `X-Forwarded-For`, else `X-Real-IP`, else the peer address.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn refusal(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}
