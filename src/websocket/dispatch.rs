use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;

use crate::types::Envelope;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct HandlerEntry {
    id: u64,
    handler: Handler,
}

type Registry = RwLock<HashMap<String, Vec<HandlerEntry>>>;

/// Listener registry mapping event kinds to ordered handler lists.
///
/// Handlers for a kind run in registration order. A panicking handler is
/// caught and logged so it cannot block delivery to the handlers after it,
/// and envelopes with no registered listeners are dropped silently.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    inner: Arc<Registry>,
    next_id: Arc<AtomicU64>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an event kind.
    ///
    /// The returned [`Subscription`] unsubscribes the handler when
    /// dropped; keep it alive for as long as the handler should receive
    /// events.
    pub fn subscribe(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let kind = kind.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = HandlerEntry {
            id,
            handler: Arc::new(handler),
        };

        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind.clone())
            .or_default()
            .push(entry);

        Subscription {
            kind,
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an envelope's data to every handler registered for its kind
    pub fn dispatch(&self, envelope: &Envelope) {
        // Copy the handler list out so no lock is held across handler
        // calls; handlers may subscribe or unsubscribe reentrantly.
        let handlers: Vec<Handler> = {
            let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            match map.get(&envelope.kind) {
                Some(entries) => entries.iter().map(|e| Arc::clone(&e.handler)).collect(),
                None => {
                    tracing::trace!(kind = %envelope.kind, "no listeners registered");
                    return;
                }
            }
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&envelope.data))).is_err() {
                tracing::error!(kind = %envelope.kind, "event listener panicked");
            }
        }
    }

    /// Number of handlers registered for a kind
    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

/// Handle to a registered event listener.
///
/// Dropping the handle removes the listener; [`unsubscribe`](Self::unsubscribe)
/// does the same explicitly.
pub struct Subscription {
    kind: String,
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// The event kind this subscription listens for
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Remove the listener now
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut map = registry.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(entries) = map.get_mut(&self.kind) {
                entries.retain(|e| e.id != self.id);
                if entries.is_empty() {
                    map.remove(&self.kind);
                }
            }
        }
    }
}
