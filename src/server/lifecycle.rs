// src/server/lifecycle.rs

//! Engine lifecycle: listener lists, disconnect handling, the reconnect
//! grace timer and client removal.

use super::SyncsServer;
use crate::connection::Connection;
use crate::core::client::{Client, ClientListener};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A listener for non-command application messages.
pub type MessageListener = Arc<dyn Fn(&Value, &Arc<Client>) + Send + Sync>;

/// Per-category lifecycle listener lists, dispatched synchronously in
/// registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    connection: Mutex<Vec<ClientListener>>,
    re_connection: Mutex<Vec<ClientListener>>,
    client_disconnect: Mutex<Vec<ClientListener>>,
    client_close: Mutex<Vec<ClientListener>>,
    message: Mutex<Vec<MessageListener>>,
}

impl Listeners {
    // The lists are always snapshotted before dispatch: the iterator
    // expression of a `for` loop keeps its lock guard alive for the whole
    // loop, and a callback may register further listeners.
    pub(crate) fn fire_connection(&self, client: &Arc<Client>) {
        let listeners = self.connection.lock().clone();
        for listener in listeners {
            listener(client);
        }
    }

    pub(crate) fn fire_re_connection(&self, client: &Arc<Client>) {
        let listeners = self.re_connection.lock().clone();
        for listener in listeners {
            listener(client);
        }
    }

    pub(crate) fn fire_client_disconnect(&self, client: &Arc<Client>) {
        let listeners = self.client_disconnect.lock().clone();
        for listener in listeners {
            listener(client);
        }
    }

    pub(crate) fn fire_client_close(&self, client: &Arc<Client>) {
        let listeners = self.client_close.lock().clone();
        for listener in listeners {
            listener(client);
        }
    }

    pub(crate) fn fire_message(&self, message: &Value, client: &Arc<Client>) {
        let listeners = self.message.lock().clone();
        for listener in listeners {
            listener(message, client);
        }
    }
}

impl SyncsServer {
    /// Registers a listener fired when a new client completes its first
    /// handshake.
    pub fn on_connection(&self, listener: impl Fn(&Arc<Client>) + Send + Sync + 'static) {
        self.listeners.connection.lock().push(Arc::new(listener));
    }

    /// Registers a listener fired when a known client re-handshakes within
    /// its grace period.
    pub fn on_re_connection(&self, listener: impl Fn(&Arc<Client>) + Send + Sync + 'static) {
        self.listeners.re_connection.lock().push(Arc::new(listener));
    }

    /// Registers a listener fired on every transport drop of a registered
    /// client.
    pub fn on_client_disconnect(&self, listener: impl Fn(&Arc<Client>) + Send + Sync + 'static) {
        self.listeners
            .client_disconnect
            .lock()
            .push(Arc::new(listener));
    }

    /// Registers a listener fired when a client is permanently removed
    /// after staying offline through its grace period.
    pub fn on_client_close(&self, listener: impl Fn(&Arc<Client>) + Send + Sync + 'static) {
        self.listeners.client_close.lock().push(Arc::new(listener));
    }

    /// Registers a listener for non-command application messages from
    /// identified clients.
    pub fn on_message(&self, listener: impl Fn(&Value, &Arc<Client>) + Send + Sync + 'static) {
        self.listeners.message.lock().push(Arc::new(listener));
    }

    /// Handles the transport close notification.
    ///
    /// Marks the client offline and fires the disconnect listeners. Unless
    /// the close was programmatic, a grace timer starts; when it fires with
    /// the client still offline, the client is removed for good. Overlapping
    /// timers from rapid disconnect/reconnect cycles are safe: each
    /// re-checks the online flag, and the close guard on the client keeps
    /// the close listeners from firing twice.
    pub fn handle_close(self: &Arc<Self>, connection: &Connection) {
        let client = connection.client();
        if client.socket_id().is_none() {
            // The transport dropped before the handshake completed; the
            // provisional client was never registered anywhere.
            return;
        }
        client.set_online(false);
        client.fire_disconnect();
        self.listeners.fire_client_disconnect(&client);
        if client.was_explicitly_closed() {
            return;
        }
        let server = self.clone();
        let timeout = self.config.close_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !client.is_online() && client.mark_closed() {
                debug!(socket_id = ?client.socket_id(), "grace period elapsed, removing client");
                server.remove_client(&client);
                client.fire_close();
                server.listeners.fire_client_close(&client);
            }
        });
    }

    /// Closes the transport and removes the client from the registry and
    /// from every group it belongs to. Idempotent.
    pub fn remove_client(&self, client: &Arc<Client>) {
        client.transport().close();
        if let Some(socket_id) = client.socket_id() {
            self.clients.remove(&socket_id);
        }
        for name in client.take_groups() {
            if let Some(group) = self.groups.get(&name).map(|e| e.value().clone()) {
                group.remove(client);
            }
        }
    }
}
