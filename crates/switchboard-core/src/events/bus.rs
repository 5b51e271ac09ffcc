//! Event bus using tokio broadcast channel
//!
//! Lets collaborators outside the store follow lifecycle events without
//! registering observers. Slow subscribers will miss events rather than
//! blocking the store.

use crate::events::StoreEvent;
use tokio::sync::broadcast;

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 1024;

/// Event bus for store lifecycle events
///
/// Events are fire-and-forget; if no subscribers are listening, events are
/// simply dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Emit an event to all subscribers. Never blocks and never fails.
    pub fn emit(&self, event: StoreEvent) {
        // Err only means there are no receivers right now.
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber to event bus
pub struct EventSubscriber {
    receiver: broadcast::Receiver<StoreEvent>,
}

impl EventSubscriber {
    /// Receive the next event
    ///
    /// Returns None once the bus is dropped. Lagging skips missed events.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Event subscriber lagged by {} events", n);
                    continue;
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Signal;
    use crate::types::Item;

    fn event(key: &str) -> StoreEvent {
        StoreEvent::new(Signal::PostSave, "switch", &Item::new().with_id(1).with("key", key))
    }

    #[tokio::test]
    async fn test_event_bus_basic() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.emit(event("foo"));

        let received = sub.recv().await.unwrap();
        assert_eq!(received.snapshot["key"], "foo");
        assert_eq!(received.signal, Signal::PostSave);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        bus.emit(event("foo"));

        let r1 = sub1.recv().await.unwrap();
        let r2 = sub2.recv().await.unwrap();
        assert_eq!(r1.event_id, r2.event_id);
    }

    #[test]
    fn test_no_subscribers_no_panic() {
        let bus = EventBus::new();
        bus.emit(event("foo"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_try_recv_after_drop_of_bus() {
        let bus = EventBus::with_capacity(4);
        let mut sub = bus.subscribe();
        bus.emit(event("a"));
        drop(bus);
        assert!(sub.try_recv().is_some());
        assert!(sub.try_recv().is_none());
    }
}
