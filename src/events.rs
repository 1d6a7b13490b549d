//! Event Bus
//!
//! Fans freshly computed classifications out to registered observers.
//! Cache hits, rate-limited answers and empty input are never published.
//!
//! Delivery is synchronous and best-effort. Each handler runs in isolation:
//! a panicking handler is logged and skipped, and neither the publisher nor
//! the other handlers see the fault. The bus does not own subscriber
//! lifetimes; a [`Subscription`] only holds a weak reference back to the bus
//! and removes its handler when [`Subscription::unsubscribe`] is called.
//!
//! ## Usage
//!
//! ```rust
//! use tokio_emotion_orchestrator::EventBus;
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(|event| {
//!     println!("{} -> {}", event.key, event.classification.emotion());
//! });
//! // ...
//! subscription.unsubscribe();
//! ```

use crate::{metrics, Classification, NormalizedKey};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};
use uuid::Uuid;

/// A freshly computed classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationEvent {
    /// Normalized key of the classified text.
    pub key: NormalizedKey,
    /// The result, as cached.
    pub classification: Classification,
    /// When the result was published.
    pub published_at: DateTime<Utc>,
}

impl ClassificationEvent {
    /// Build an event stamped with the current time.
    pub fn new(key: NormalizedKey, classification: Classification) -> Self {
        Self {
            key,
            classification,
            published_at: Utc::now(),
        }
    }
}

type Handler = Arc<dyn Fn(&ClassificationEvent) + Send + Sync>;

struct Registered {
    id: Uuid,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    handlers: RwLock<Vec<Registered>>,
}

/// Synchronous publish/subscribe hub for classification events.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every subsequent publish.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ClassificationEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.inner.handlers.write().push(Registered {
            id,
            handler: Arc::new(handler),
        });
        debug!(subscription = %id, "event subscriber registered");
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber. Returns the number of
    /// handlers that completed without panicking.
    pub fn publish(&self, event: &ClassificationEvent) -> usize {
        // Snapshot so handlers may subscribe or unsubscribe while running.
        let handlers: Vec<(Uuid, Handler)> = self
            .inner
            .handlers
            .read()
            .iter()
            .map(|r| (r.id, Arc::clone(&r.handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    metrics::inc_subscriber_fault();
                    warn!(
                        subscription = %id,
                        key = %event.key,
                        error = %message,
                        "event subscriber failed"
                    );
                }
            }
        }
        metrics::inc_event_published();
        debug!(key = %event.key, delivered = delivered, "classification published");
        delivered
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.handlers.read().len()
    }
}

/// Handle to a registered subscriber.
///
/// Dropping the handle leaves the subscriber registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Identifier of this subscription.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Remove the handler from the bus. Returns `false` if the bus is gone or
    /// the handler was already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };
        let mut handlers = bus.handlers.write();
        let before = handlers.len();
        handlers.retain(|r| r.id != self.id);
        let removed = handlers.len() < before;
        if removed {
            debug!(subscription = %self.id, "event subscriber removed");
        }
        removed
    }
}
