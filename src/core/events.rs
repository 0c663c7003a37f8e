// src/core/events.rs

//! The inbound event bus: subscriptions keyed by event name.
//!
//! Inbound and outbound event flow are independent one-directional channels
//! sharing a wire shape: `publish` on the server, group or client sends
//! directly to the targets and never consults this table.

use crate::core::client::Client;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// A callback invoked for every inbound event it is subscribed to.
pub type EventCallback = Arc<dyn Fn(&Value, &Arc<Client>) + Send + Sync>;

/// Token returned by `subscribe`, used to remove that registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Per-event callback lists, dispatched in registration order.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<HashMap<String, Vec<(SubscriptionId, EventCallback)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a callback for `event` and returns its removal token.
    pub fn subscribe(
        &self,
        event: &str,
        callback: impl Fn(&Value, &Arc<Client>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .write()
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes one registration. Returns false when the token does not
    /// name a live registration for `event`.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        match subscriptions.get_mut(event) {
            Some(callbacks) => {
                let before = callbacks.len();
                callbacks.retain(|(callback_id, _)| *callback_id != id);
                callbacks.len() != before
            }
            None => false,
        }
    }

    /// Invokes every callback registered for `event`, in registration
    /// order, with the payload and the originating client.
    pub(crate) fn dispatch(&self, event: &str, data: &Value, client: &Arc<Client>) {
        let callbacks: Vec<EventCallback> = self
            .subscriptions
            .read()
            .get(event)
            .map(|callbacks| callbacks.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        if callbacks.is_empty() {
            trace!(event, "inbound event with no subscribers");
        }
        for callback in callbacks {
            callback(data, client);
        }
    }
}
