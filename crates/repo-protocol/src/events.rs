//! Protocol events for monitoring.
//!
//! The inbox and outbox publish a [`ProtocolEvent`] for every message they
//! handle, so dropped messages and suppressed duplicates can be counted
//! separately without parsing logs.

use crate::ids::{PeerId, SessionId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProtocolEvent {
    /// A message was classified and handed on.
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        /// Wire tag, e.g. "sync".
        message_type: String,
        sender_id: PeerId,
        size: usize,
        /// Milliseconds since Unix epoch.
        timestamp: u64,
    },
    /// A message was stamped and passed to the transport.
    #[serde(rename_all = "camelCase")]
    MessageSent {
        message_type: String,
        target_id: PeerId,
        timestamp: u64,
    },
    /// A message could not be classified and was dropped.
    #[serde(rename_all = "camelCase")]
    MessageDropped {
        /// Short reason label, e.g. "unrecognized-type" or "malformed".
        reason: String,
        detail: String,
        timestamp: u64,
    },
    /// An ephemeral message was a re-delivery and was discarded.
    #[serde(rename_all = "camelCase")]
    DuplicateSuppressed {
        sender_id: PeerId,
        session_id: SessionId,
        count: u64,
        timestamp: u64,
    },
}

/// Listener registration. Dropping it removes the listener.
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Keep the listener registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Fan-out of events to registered listeners, [`ProtocolEvent`] by default.
///
/// Listeners run synchronously on the emitting task and should only record
/// or forward the event.
pub struct EventBus<E = ProtocolEvent> {
    listeners: RwLock<BTreeMap<u64, Listener<E>>>,
    next_id: AtomicU64,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<E: Send + Sync + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners are called in registration order.
    pub fn subscribe(self: &Arc<Self>, listener: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(listener));

        let bus = Arc::downgrade(self);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(bus) = bus.upgrade() {
                    bus.remove(id);
                }
            })),
        }
    }

    fn remove(&self, id: u64) {
        // A listener may drop its own subscription while emit() holds the read lock.
        match self.listeners.try_write() {
            Ok(mut listeners) => {
                listeners.remove(&id);
            }
            Err(_) => warn!(id, "Event listener still registered: bus busy"),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn emit(&self, event: E) {
        let listeners: Vec<Listener<E>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }
}
