//! Topic-keyed publish/subscribe bus
//!
//! Producers publish [`Event`]s under an [`EventType`]; every subscription
//! holding that topic receives a copy through its own bounded channel.
//!
//! Delivery is fire-and-forget: a subscriber whose channel is full misses
//! the event, and nothing is persisted or replayed. Dropping a
//! [`Subscription`] releases it from every topic it was registered under.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::{Event, EventType};
use crate::error::{Result, StormonError};

/// Default per-subscriber channel capacity
pub const DEFAULT_BUS_BUFFER: usize = 100;

type SubscriptionId = u64;

struct BusInner {
    /// topic -> (subscription id -> sender)
    topics: RwLock<HashMap<EventType, HashMap<SubscriptionId, mpsc::Sender<Event>>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl BusInner {
    fn release(&self, id: SubscriptionId, topics: &[EventType]) {
        let mut map = self.topics.write();
        for topic in topics {
            if let Some(subs) = map.get_mut(topic) {
                subs.remove(&id);
                if subs.is_empty() {
                    map.remove(topic);
                }
            }
        }
    }
}

/// In-process event bus. Cheap to clone; clones share subscribers.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUS_BUFFER)
    }

    /// Create a bus whose subscriber channels hold `buffer` pending events
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Publish an event to all current subscribers of its topic.
    ///
    /// Returns the number of subscribers the event was queued for. Full or
    /// closed subscriber channels are skipped.
    pub fn publish(&self, event: Event) -> usize {
        let topics = self.inner.topics.read();
        let Some(subs) = topics.get(&event.event_type) else {
            return 0;
        };

        let mut delivered = 0;
        for (id, sender) in subs.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(
                        subscription = id,
                        event_type = %event.event_type,
                        "bus subscriber lagging, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Receiver gone; its Subscription drop releases the entry
                }
            }
        }
        delivered
    }

    /// Publish under a topic given by name.
    ///
    /// Topics outside the catalog cannot be delivered; they are logged and
    /// reported as [`StormonError::UnknownEventType`].
    pub fn publish_raw(&self, topic: &str, payload: serde_json::Value) -> Result<usize> {
        match EventType::parse(topic) {
            Some(event_type) => Ok(self.publish(Event::new(event_type, payload))),
            None => {
                tracing::warn!(topic, "dropping event with unknown event_type");
                Err(StormonError::UnknownEventType {
                    topic: topic.to_string(),
                })
            }
        }
    }

    /// Subscribe to a set of topics. Events for any of them arrive on the
    /// returned subscription in publication order.
    pub fn subscribe(&self, topics: &[EventType]) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);

        let mut unique: Vec<EventType> = topics.to_vec();
        unique.sort();
        unique.dedup();

        {
            let mut map = self.inner.topics.write();
            for topic in &unique {
                map.entry(*topic).or_default().insert(id, tx.clone());
            }
        }

        Subscription {
            id,
            topics: unique,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Release a subscription. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Number of subscriptions currently holding `topic`
    pub fn subscriber_count(&self, topic: EventType) -> usize {
        self.inner
            .topics
            .read()
            .get(&topic)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a bus subscription
pub struct Subscription {
    id: SubscriptionId,
    topics: Vec<EventType>,
    rx: mpsc::Receiver<Event>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Wait for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    pub fn topics(&self) -> &[EventType] {
        &self.topics
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.release(self.id, &self.topics);
        }
    }
}
