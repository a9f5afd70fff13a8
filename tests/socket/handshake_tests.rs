//! Handshake Tests
//!
//! Origin screening, endpoint path, and admission control happen before the
//! upgrade completes; a refused handshake must not leave a connection behind.

use crate::common::test_server::refusal_status;
use crate::common::TestServer;

// ============================================================================
// ORIGIN TESTS
// ============================================================================

/// Non-browser clients send no Origin and are allowed
#[tokio::test]
async fn test_missing_origin_allowed() {
    let server = TestServer::start().await;
    let client = server.connect().await;
    assert_eq!(server.active(), 1);
    client.close().await;
}

/// A LAN address origin is allowed
#[tokio::test]
async fn test_private_origin_allowed() {
    let server = TestServer::start().await;
    let client = server
        .connect_with_origin("http://192.168.1.50")
        .await
        .expect("LAN origin should be accepted");
    client.close().await;
}

/// mDNS hostnames are allowed
#[tokio::test]
async fn test_local_hostname_origin_allowed() {
    let server = TestServer::start().await;
    for origin in ["http://tower.local:8080", "http://tower", "https://localhost:3000"] {
        let client = server
            .connect_with_origin(origin)
            .await
            .unwrap_or_else(|e| panic!("origin {} should be accepted: {}", origin, e));
        client.close().await;
    }
}

/// Public origins are refused with 403 and never admitted
#[tokio::test]
async fn test_foreign_origin_rejected() {
    let server = TestServer::start().await;

    let err = match server.connect_with_origin("http://evil.example.com").await {
        Err(e) => e,
        Ok(_) => panic!("foreign origin should be refused"),
    };
    assert_eq!(refusal_status(&err), Some(403));
    assert_eq!(server.active(), 0);
}

// ============================================================================
// ENDPOINT TESTS
// ============================================================================

/// Only the configured path upgrades
#[tokio::test]
async fn test_wrong_path_not_found() {
    let server = TestServer::start().await;

    let err = match server.try_connect(&server.url_for("/events"), None).await {
        Err(e) => e,
        Ok(_) => panic!("wrong path should be refused"),
    };
    assert_eq!(refusal_status(&err), Some(404));
    assert_eq!(server.active(), 0);
}

// ============================================================================
// ADMISSION TESTS
// ============================================================================

/// The (max+1)-th concurrent connection gets 503 and creates no state
#[tokio::test]
async fn test_capacity_exceeded_returns_503() {
    let server = TestServer::with_limits(2, 100).await;

    let first = server.connect().await;
    let _second = server.connect().await;
    assert_eq!(server.active(), 2);

    let err = match server.try_connect(&server.url(), None).await {
        Err(e) => e,
        Ok(_) => panic!("third connection should be refused"),
    };
    assert_eq!(refusal_status(&err), Some(503));
    assert_eq!(server.active(), 2);

    // A freed slot can be reused
    first.close().await;
    assert!(server.wait_for_active(1).await);
    let _third = server.connect().await;
    assert_eq!(server.active(), 2);
}

/// Origin is checked before capacity: a rejected origin does not consume a slot
#[tokio::test]
async fn test_rejected_origin_does_not_use_capacity() {
    let server = TestServer::with_limits(1, 100).await;

    assert!(server
        .connect_with_origin("https://attacker.example.org")
        .await
        .is_err());
    let client = server.connect().await;
    assert_eq!(server.active(), 1);
    client.close().await;
}
