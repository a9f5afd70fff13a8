//! Fan-out Tests
//!
//! Events published on the bus reach exactly the connections subscribed to
//! their topic, in publish order.

use serde_json::json;
use stormon::{Event, EventType};

use crate::common::TestServer;

fn array_event(state: &str) -> Event {
    Event::new(EventType::ArrayStatus, json!({ "state": state }))
}

// ============================================================================
// DELIVERY TESTS
// ============================================================================

#[tokio::test]
async fn test_event_delivered_to_subscriber() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    client.subscribe(&["array.status"]).await;

    server.bus.publish(array_event("started"));

    let frame = client.recv_json().await.expect("No event received");
    assert_eq!(frame["event_type"], "array.status");
    assert_eq!(frame["data"]["state"], "started");
    assert!(frame["timestamp"].is_string());
    assert!(client.is_quiet().await, "Event should be delivered once");
}

/// Only the subscribed client sees the event
#[tokio::test]
async fn test_event_filtered_per_connection() {
    let server = TestServer::start().await;
    let mut subscribed = server.connect().await;
    let mut other = server.connect().await;

    subscribed.subscribe(&["array.status"]).await;
    other.subscribe(&["docker.events"]).await;

    server.bus.publish(array_event("started"));

    let frame = subscribed.recv_json().await.expect("No event received");
    assert_eq!(frame["event_type"], "array.status");
    assert!(other.is_quiet().await, "Unsubscribed client received an event");
}

#[tokio::test]
async fn test_unsubscribed_client_receives_nothing() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.subscribe(&["array.status"]).await;
    client.unsubscribe(&["array.status"]).await;

    server.bus.publish(array_event("stopped"));
    assert!(client.is_quiet().await);
}

#[tokio::test]
async fn test_no_subscriptions_no_events() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    client.ping().await;

    for event_type in EventType::ALL {
        server.bus.publish(Event::new(event_type, json!({})));
    }
    assert!(client.is_quiet().await);
}

/// Events on one topic arrive in publish order
#[tokio::test]
async fn test_event_order_preserved() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    client.subscribe(&["task.progress"]).await;

    for percent in 0..10 {
        server
            .bus
            .publish(Event::new(EventType::TaskProgress, json!({ "percent": percent })));
    }

    for expected in 0..10 {
        let frame = client.recv_json().await.expect("Missing progress event");
        assert_eq!(frame["data"]["percent"], expected);
    }
}

/// Raw publishes reach subscribers through the same path
#[tokio::test]
async fn test_publish_raw_delivered() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    client.subscribe(&["ups.status"]).await;

    let delivered = server
        .bus
        .publish_raw("ups.status", json!({ "on_battery": true }))
        .expect("known topic");
    assert!(delivered >= 1);

    let frame = client.recv_json().await.expect("No event received");
    assert_eq!(frame["data"]["on_battery"], true);

    assert!(server.bus.publish_raw("ups.unknown", json!({})).is_err());
}

/// Several clients on the same topic each get their own copy
#[tokio::test]
async fn test_fanout_to_many_clients() {
    let server = TestServer::start().await;
    let mut clients = Vec::new();
    for _ in 0..5 {
        let mut client = server.connect().await;
        client.subscribe(&["system.alert"]).await;
        clients.push(client);
    }

    server
        .bus
        .publish(Event::new(EventType::SystemAlert, json!({ "level": "warn" })));

    for client in clients.iter_mut() {
        let frame = client.recv_json().await.expect("Client missed the alert");
        assert_eq!(frame["event_type"], "system.alert");
    }
}
