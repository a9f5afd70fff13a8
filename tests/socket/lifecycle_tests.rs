//! Lifecycle Tests
//!
//! Registration and cleanup across every way a connection can end: client
//! close, oversized frames, and server shutdown.

use stormon::AgentConfig;

use crate::common::TestServer;

#[tokio::test]
async fn test_client_close_unregisters() {
    let server = TestServer::start().await;
    let client = server.connect().await;
    assert_eq!(server.active(), 1);

    client.close().await;
    assert!(server.wait_for_active(0).await);
}

#[tokio::test]
async fn test_snapshot_reports_connection() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    client.subscribe(&["cpu.stats", "memory.stats"]).await;

    let snapshot = server.server.registry().snapshot();
    assert_eq!(snapshot.len(), 1);
    let summary = &snapshot[0];
    assert!(summary.id.starts_with("conn_"));
    assert_eq!(summary.client_ip, "127.0.0.1");
    assert_eq!(
        summary.subscriptions,
        vec!["cpu.stats".to_string(), "memory.stats".to_string()]
    );
    assert!(summary.idle_secs < 5);
}

/// Frames over the configured size end the connection
#[tokio::test]
async fn test_oversized_message_closes_connection() {
    let mut config = AgentConfig::default();
    config.limits.max_message_size = 1024;
    let server = TestServer::with_config(config).await;
    let mut client = server.connect().await;

    let padding = "x".repeat(2048);
    let _ = client
        .send_text(&format!(r#"{{"type":"ping","pad":"{}"}}"#, padding))
        .await;

    assert!(client.closed_by_server().await);
    assert!(server.wait_for_active(0).await);
}

#[tokio::test]
async fn test_shutdown_closes_all_connections() {
    let server = TestServer::start().await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;
    assert_eq!(server.active(), 2);

    server.server.shutdown();

    assert!(first.closed_by_server().await);
    assert!(second.closed_by_server().await);
    assert!(server.wait_for_active(0).await);
}

/// After shutdown the listener stops admitting new clients
#[tokio::test]
async fn test_no_connections_after_shutdown() {
    let server = TestServer::start().await;
    server.server.shutdown();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert!(server.try_connect(&server.url(), None).await.is_err());
}
