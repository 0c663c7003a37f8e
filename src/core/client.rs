// src/core/client.rs

//! The client entity: one logical peer identity.
//!
//! A `Client` is created provisionally when a transport connects and is
//! promoted to the registry once the handshake confirms its socket id. The
//! object survives transport drops; on reconnect the new transport is bound
//! onto the existing object, so shared-state handles and pending RMI
//! correlations carry across.

use crate::connection::Transport;
use crate::core::protocol::{CommandEnvelope, escape};
use crate::core::shared::SharedObject;
use crate::core::{SyncsError, SyncsResult};
use crate::server::SyncsServer;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// A lifecycle listener attached to a single client.
pub type ClientListener = Arc<dyn Fn(&Arc<Client>) + Send + Sync>;

type PendingRmi = oneshot::Sender<SyncsResult<Value>>;

/// One logical peer identity.
pub struct Client {
    /// Process-unique key for this object, used for group membership.
    /// Distinct from the socket id, which is only assigned at handshake.
    session_id: u64,
    server: Weak<SyncsServer>,
    socket_id: RwLock<Option<String>>,
    online: AtomicBool,
    transport: RwLock<Arc<dyn Transport>>,
    /// Distinguishes a programmatic `close()` from a transport drop; set
    /// before removal so the disconnect path skips the grace timer.
    explicit_close: AtomicBool,
    /// Guard ensuring the close lifecycle runs at most once even when
    /// overlapping grace timers fire for the same offline stretch.
    closed: AtomicBool,
    member_groups: Mutex<HashSet<String>>,
    /// Free-form per-client storage for embedding code.
    data: Mutex<Map<String, Value>>,
    shared_objects: Mutex<HashMap<String, Arc<SharedObject>>>,
    pending_rmi: Mutex<HashMap<String, PendingRmi>>,
    disconnect_listeners: Mutex<Vec<ClientListener>>,
    close_listeners: Mutex<Vec<ClientListener>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session_id", &self.session_id)
            .field("socket_id", &*self.socket_id.read())
            .field("online", &self.online.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Client {
    pub(crate) fn new(
        session_id: u64,
        server: Weak<SyncsServer>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            server,
            socket_id: RwLock::new(None),
            online: AtomicBool::new(false),
            transport: RwLock::new(transport),
            explicit_close: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            member_groups: Mutex::new(HashSet::new()),
            data: Mutex::new(Map::new()),
            shared_objects: Mutex::new(HashMap::new()),
            pending_rmi: Mutex::new(HashMap::new()),
            disconnect_listeners: Mutex::new(Vec::new()),
            close_listeners: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn session_id(&self) -> u64 {
        self.session_id
    }

    /// The opaque identity string, stable across reconnects. `None` until
    /// the handshake completes.
    pub fn socket_id(&self) -> Option<String> {
        self.socket_id.read().clone()
    }

    pub(crate) fn set_socket_id(&self, socket_id: &str) {
        *self.socket_id.write() = Some(socket_id.to_string());
    }

    /// True only between a successful handshake and the transport close.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn rebind_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write() = transport;
    }

    pub(crate) fn was_explicitly_closed(&self) -> bool {
        self.explicit_close.load(Ordering::SeqCst)
    }

    /// Returns true for the caller that wins the close race; later callers
    /// (overlapping grace timers) see false and back off.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Names of the groups this client is currently a member of.
    pub fn groups(&self) -> Vec<String> {
        self.member_groups.lock().iter().cloned().collect()
    }

    pub(crate) fn join_group(&self, name: &str) {
        self.member_groups.lock().insert(name.to_string());
    }

    pub(crate) fn leave_group(&self, name: &str) {
        self.member_groups.lock().remove(name);
    }

    pub(crate) fn take_groups(&self) -> Vec<String> {
        self.member_groups.lock().drain().collect()
    }

    /// Reads a key from the free-form per-client storage (`Null` if absent).
    pub fn get_data(&self, key: &str) -> Value {
        self.data.lock().get(key).cloned().unwrap_or(Value::Null)
    }

    /// Writes a key into the free-form per-client storage. Local only,
    /// never replicated.
    pub fn set_data(&self, key: &str, value: Value) {
        self.data.lock().insert(key.to_string(), value);
    }

    /// Sends a plain application message (not a protocol command).
    ///
    /// Returns false when the client is offline and could not accept
    /// delivery; the caller decides whether and how to retry.
    pub fn send(&self, message: &Value) -> bool {
        if !self.is_online() {
            return false;
        }
        let text = escape(&message.to_string());
        self.transport.read().send(&text).is_ok()
    }

    /// Serializes, escapes and sends a protocol command. Unlike [`send`],
    /// this does not gate on the online flag: the handshake itself runs
    /// before the client is online.
    ///
    /// [`send`]: Client::send
    pub(crate) fn send_command(&self, command: &CommandEnvelope) -> SyncsResult<()> {
        let value = command.to_value();
        if let Some(server) = self.server.upgrade()
            && server.debug_enabled()
        {
            info!("OUTPUT COMMAND: {value}");
        }
        let text = escape(&value.to_string());
        self.transport.read().send(&text)?;
        Ok(())
    }

    /// Publishes an event to this client. Returns false when offline.
    pub fn publish(&self, event: &str, data: Value) -> bool {
        if !self.is_online() {
            return false;
        }
        self.send_command(&CommandEnvelope::Event {
            event: event.to_string(),
            data,
        })
        .is_ok()
    }

    /// Returns the client-scoped shared object `name`, creating it writable
    /// for the client on first access.
    pub fn shared(self: &Arc<Self>, name: &str) -> Arc<SharedObject> {
        self.shared_with_access(name, false)
    }

    /// Like [`shared`], but controls the read-only gate when the object is
    /// first created. The gate of an existing object is never changed.
    ///
    /// [`shared`]: Client::shared
    pub fn shared_with_access(self: &Arc<Self>, name: &str, read_only: bool) -> Arc<SharedObject> {
        self.shared_objects
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| SharedObject::client_level(name, self, Map::new(), read_only))
            .clone()
    }

    /// Applies an inbound `sync` write to the named client-scoped object.
    /// Writes to objects this client never created are ignored.
    pub(crate) fn apply_sync_write(&self, name: &str, key: &str, value: Value) {
        let shared = self.shared_objects.lock().get(name).cloned();
        match shared {
            Some(shared) => shared.apply_client_write(key, value),
            None => trace!(name, "sync write for unknown shared object ignored"),
        }
    }

    /// Invokes a method on the remote peer.
    ///
    /// The command is sent immediately (skipped while offline, matching the
    /// correlation-table contract: the entry pends until a reply arrives on
    /// some future transport) and the returned future resolves when the
    /// matching `rmi-result` comes back. There is no timeout.
    pub fn call_remote(
        self: &Arc<Self>,
        name: &str,
        args: Vec<Value>,
    ) -> BoxFuture<'static, SyncsResult<Value>> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending_rmi.lock().insert(id.clone(), tx);
        if self.is_online() {
            let send_result = self.send_command(&CommandEnvelope::Rmi {
                id,
                name: name.to_string(),
                args,
            });
            if let Err(e) = send_result {
                debug!("failed to send rmi command: {e}");
            }
        }
        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(SyncsError::RemoteAbandoned),
            }
        })
    }

    /// Resolves the pending call matching an inbound `rmi-result`. Results
    /// for unknown ids are ignored.
    pub(crate) fn resolve_rmi(&self, id: &str, result: Value, error: Option<String>) {
        let pending = self.pending_rmi.lock().remove(id);
        match pending {
            Some(tx) => {
                let outcome = match error {
                    Some(message) => Err(SyncsError::Remote(message)),
                    None => Ok(result),
                };
                let _ = tx.send(outcome);
            }
            None => trace!(id, "rmi-result for unknown id ignored"),
        }
    }

    /// Number of RMI calls awaiting a reply.
    pub fn pending_remote_calls(&self) -> usize {
        self.pending_rmi.lock().len()
    }

    /// Programmatic close: suppresses the grace timer and removes the
    /// client from the registry and all groups immediately.
    pub fn close(self: &Arc<Self>) {
        self.explicit_close.store(true, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if let Some(server) = self.server.upgrade() {
            server.remove_client(self);
        }
    }

    /// Registers a listener fired when this client's transport drops.
    pub fn on_disconnect(&self, listener: impl Fn(&Arc<Client>) + Send + Sync + 'static) {
        self.disconnect_listeners.lock().push(Arc::new(listener));
    }

    /// Registers a listener fired when this client is permanently removed
    /// after the grace period elapses.
    pub fn on_close(&self, listener: impl Fn(&Arc<Client>) + Send + Sync + 'static) {
        self.close_listeners.lock().push(Arc::new(listener));
    }

    pub(crate) fn fire_disconnect(self: &Arc<Self>) {
        let listeners = self.disconnect_listeners.lock().clone();
        for listener in listeners {
            listener(self);
        }
    }

    pub(crate) fn fire_close(self: &Arc<Self>) {
        let listeners = self.close_listeners.lock().clone();
        for listener in listeners {
            listener(self);
        }
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.read().clone()
    }
}
