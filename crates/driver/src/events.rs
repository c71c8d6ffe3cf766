//! Driver event bus
//!
//! Consumers subscribe callbacks per event kind; the driver's worker threads
//! publish into the bus. Callbacks run on the publishing thread, so they
//! should hand heavy work off rather than block the read loop.

use protocol::Message;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Why the driver declared the link dead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Consecutive bulk-transfer failures crossed the threshold
    TransportErrors { consecutive: u32 },
    /// The decoder could not find a valid frame boundary within budget
    ResyncExhausted { attempts: u32 },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::TransportErrors { consecutive } => {
                write!(f, "{consecutive} consecutive transport errors")
            }
            FailureReason::ResyncExhausted { attempts } => {
                write!(f, "frame resync gave up after {attempts} attempts")
            }
        }
    }
}

/// Everything the driver reports to its consumers
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A decoded inbound message; `Arc` so fan-out never copies payloads
    Message(Arc<Message>),
    /// The link is dead and the driver has entered `Failed`
    Failure(FailureReason),
}

impl DriverEvent {
    fn kind(&self) -> EventKind {
        match self {
            DriverEvent::Message(_) => EventKind::Message,
            DriverEvent::Failure(_) => EventKind::Failure,
        }
    }
}

/// Which event stream a listener is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Failure,
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&DriverEvent) + Send + Sync>;

struct Entry {
    id: u64,
    callback: Callback,
}

/// Listener registry with panic-isolated dispatch
///
/// Publish takes a snapshot of the listener list before invoking anything,
/// so subscribing or unsubscribing from inside a callback never deadlocks
/// and takes effect from the next publish.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&DriverEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        crate::lock(&self.listeners)
            .entry(kind)
            .or_default()
            .push(Entry {
                id,
                callback: Arc::new(callback),
            });
        ListenerId(id)
    }

    /// Remove a listener; unknown ids are a no-op
    pub fn unsubscribe(&self, id: ListenerId) {
        for entries in crate::lock(&self.listeners).values_mut() {
            entries.retain(|entry| entry.id != id.0);
        }
    }

    /// Drop every listener
    pub fn clear(&self) {
        crate::lock(&self.listeners).clear();
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        crate::lock(&self.listeners)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its kind, in subscription order
    ///
    /// A panicking callback is logged and skipped; it never takes down the
    /// publishing thread or the listeners after it.
    pub fn publish(&self, event: &DriverEvent) {
        let snapshot: Vec<Callback> = crate::lock(&self.listeners)
            .get(&event.kind())
            .map(|entries| entries.iter().map(|entry| entry.callback.clone()).collect())
            .unwrap_or_default();
        for callback in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(kind = ?event.kind(), "event listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("message_listeners", &self.listener_count(EventKind::Message))
            .field("failure_listeners", &self.listener_count(EventKind::Failure))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn message_event() -> DriverEvent {
        DriverEvent::Message(Arc::new(Message::Heartbeat))
    }

    #[test]
    fn test_listeners_fire_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = order.clone();
            bus.subscribe(EventKind::Message, move |_| {
                order.lock().unwrap().push(tag);
            });
        }
        bus.publish(&message_event());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = {
            let hits = hits.clone();
            bus.subscribe(EventKind::Message, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        bus.publish(&message_event());
        bus.unsubscribe(id);
        bus.publish(&message_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_kinds_are_independent() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            bus.subscribe(EventKind::Failure, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.publish(&message_event());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        bus.publish(&DriverEvent::Failure(FailureReason::TransportErrors {
            consecutive: 5,
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Message, |_| panic!("listener bug"));
        {
            let hits = hits.clone();
            bus.subscribe(EventKind::Message, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.publish(&message_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let bus = EventBus::new();
        bus.subscribe(EventKind::Message, |_| {});
        bus.subscribe(EventKind::Failure, |_| {});
        bus.clear();
        assert_eq!(bus.listener_count(EventKind::Message), 0);
        assert_eq!(bus.listener_count(EventKind::Failure), 0);
    }
}
