//! Origin header validation for the upgrade handshake
//!
//! Browsers always send `Origin` on WebSocket upgrades, so this is the gate
//! that keeps pages served from arbitrary sites from opening a stream to the
//! agent. Only hosts on the local network are accepted:
//!
//! - no `Origin` header at all (non-browser clients)
//! - `localhost`, `127.0.0.1`, `::1`
//! - private IPv4 (`10.0.0.0/8`, `172.16.0.0/12`, `192.168.0.0/16`)
//! - IPv6 link-local (`fe80::/10`) and unique-local (`fc00::/7`)
//! - single-label hostnames and `.local` mDNS names

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Result, StormonError};

/// Decide whether an upgrade with this `Origin` header may proceed
pub fn is_origin_allowed(origin: Option<&str>) -> bool {
    check_origin(origin).is_ok()
}

/// Same decision as [`is_origin_allowed`], with the rejected origin in the error
pub fn check_origin(origin: Option<&str>) -> Result<()> {
    let Some(origin) = origin else {
        return Ok(());
    };

    if origin_host(origin).is_some_and(is_local_host) {
        return Ok(());
    }

    tracing::warn!(origin, "rejected WebSocket origin");
    Err(StormonError::OriginRejected {
        origin: origin.to_string(),
    })
}

/// Extract the host from `scheme://host[:port][/...]`.
///
/// `None` when the scheme is not http(s) or the host is empty.
fn origin_host(origin: &str) -> Option<&str> {
    let rest = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))?;
    let authority = rest.split('/').next().unwrap_or("");

    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        // [v6addr]:port
        bracketed.split(']').next().unwrap_or("")
    } else if authority.matches(':').count() > 1 {
        // bare IPv6 without brackets
        authority
    } else {
        authority.split(':').next().unwrap_or("")
    };

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn is_local_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();

    if matches!(host.as_str(), "localhost" | "127.0.0.1" | "::1") {
        return true;
    }

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => is_private_v4(ip),
        Ok(IpAddr::V6(ip)) => is_private_v6(ip),
        Err(_) => !host.contains('.') || host.ends_with(".local"),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    // 10.0.0.0/8
    octets[0] == 10 ||
    // 172.16.0.0/12
    (octets[0] == 172 && (16..=31).contains(&octets[1])) ||
    // 192.168.0.0/16
    (octets[0] == 192 && octets[1] == 168)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    // fe80::/10 link-local, fc00::/7 unique-local
    (first & 0xffc0) == 0xfe80 || (first & 0xfe00) == 0xfc00
}
