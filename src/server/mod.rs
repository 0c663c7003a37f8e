// src/server/mod.rs

//! The connection engine: client and group registries, command dispatch,
//! the global shared-state namespace, the RMI engine and the event bus.

mod dispatch;
mod handshake;
mod lifecycle;

use crate::config::Config;
use crate::connection::{Connection, Transport};
use crate::core::client::Client;
use crate::core::events::{EventBus, SubscriptionId};
use crate::core::group::Group;
use crate::core::protocol::{CommandEnvelope, unescape};
use crate::core::rmi::{HandlerResult, RmiEngine};
use crate::core::shared::SharedObject;
use crate::core::SyncsResult;
use dashmap::DashMap;
use futures::future::BoxFuture;
use lifecycle::Listeners;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{info, trace};

/// The synchronization engine.
///
/// One instance serves many clients. The embedding listener calls
/// [`accept`] once per transport, then pushes inbound text through
/// [`handle_message`] and the single close notification through
/// [`handle_close`]; everything else is driven by the engine.
///
/// [`accept`]: SyncsServer::accept
/// [`handle_message`]: SyncsServer::handle_message
/// [`handle_close`]: SyncsServer::handle_close
pub struct SyncsServer {
    config: Config,
    debug: AtomicBool,
    clients: DashMap<String, Arc<Client>>,
    groups: DashMap<String, Arc<Group>>,
    shared_objects: DashMap<String, Arc<SharedObject>>,
    events: EventBus,
    rmi: RmiEngine,
    listeners: Listeners,
    next_session_id: AtomicU64,
}

impl SyncsServer {
    /// Creates an engine with the given configuration.
    pub fn new(config: Config) -> Arc<Self> {
        let debug = AtomicBool::new(config.debug);
        info!(path = %config.path, close_timeout = ?config.close_timeout, "syncs engine initialized");
        Arc::new(Self {
            config,
            debug,
            clients: DashMap::new(),
            groups: DashMap::new(),
            shared_objects: DashMap::new(),
            events: EventBus::new(),
            rmi: RmiEngine::new(),
            listeners: Listeners::default(),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Creates an engine with the default configuration.
    pub fn with_defaults() -> Arc<Self> {
        Self::new(Config::default())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accepts a freshly connected transport: binds a provisional client to
    /// it and starts the handshake by requesting the peer's identity.
    pub fn accept(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Arc<Connection> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let client = Client::new(session_id, Arc::downgrade(self), transport.clone());
        let connection = Connection::new(transport, client.clone());
        self.send_handshake_request(&client);
        connection
    }

    /// Handles one inbound text frame from a transport.
    ///
    /// Payloads that fail to unescape or parse are dropped silently.
    /// Command envelopes are dispatched by type; anything else reaches the
    /// `message` observers once the client is identified, and re-triggers
    /// the handshake request before that.
    pub fn handle_message(self: &Arc<Self>, connection: &Connection, raw: &str) {
        let Some(text) = unescape(raw) else {
            trace!("dropping payload with invalid escaping");
            return;
        };
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            trace!("dropping unparsable payload");
            return;
        };
        if CommandEnvelope::is_command(&value) {
            if self.debug_enabled() {
                info!("INPUT COMMAND: {value}");
            }
            match CommandEnvelope::from_value(&value) {
                Some(command) => self.on_command(connection, command),
                None => trace!("dropping command of unknown type"),
            }
        } else {
            let client = connection.client();
            if client.socket_id().is_some() {
                self.listeners.fire_message(&value, &client);
            } else {
                // The peer is talking before identifying itself; the
                // handshake reply may have been lost. Ask again.
                self.send_handshake_request(&client);
            }
        }
    }

    /// Returns the group `name`, creating and registering it on first
    /// reference. Groups are retained for the process lifetime.
    pub fn group(&self, name: &str) -> Arc<Group> {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| Group::new(name))
            .value()
            .clone()
    }

    /// Returns the global shared object `name`, creating it read-only for
    /// clients on first access.
    pub fn shared(self: &Arc<Self>, name: &str) -> Arc<SharedObject> {
        self.shared_objects
            .entry(name.to_string())
            .or_insert_with(|| SharedObject::global_level(name, self, Map::new(), true))
            .value()
            .clone()
    }

    /// Subscribes a callback to inbound events named `event`.
    pub fn subscribe(
        &self,
        event: &str,
        callback: impl Fn(&Value, &Arc<Client>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(event, callback)
    }

    /// Removes one event subscription.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        self.events.unsubscribe(event, id)
    }

    /// Publishes an event to every registered client. Returns the clients
    /// that were offline and could not accept delivery.
    pub fn publish(&self, event: &str, data: Value) -> Vec<Arc<Client>> {
        let mut rejected = Vec::new();
        for client in self.clients() {
            if !client.publish(event, data.clone()) {
                rejected.push(client);
            }
        }
        rejected
    }

    /// Sends a plain application message to every registered client.
    /// Returns the clients that were offline and could not accept delivery.
    pub fn send(&self, message: &Value) -> Vec<Arc<Client>> {
        let mut rejected = Vec::new();
        for client in self.clients() {
            if !client.send(message) {
                rejected.push(client);
            }
        }
        rejected
    }

    /// Registers (or replaces) the RMI function invokable under `name`.
    pub fn register_function(
        &self,
        name: &str,
        handler: impl Fn(Arc<Client>, Vec<Value>) -> BoxFuture<'static, HandlerResult>
        + Send
        + Sync
        + 'static,
    ) {
        self.rmi.register_function(name, handler);
    }

    /// Registers an RMI interceptor for call names matching `pattern`
    /// (a regular expression). Interceptors run in registration order; the
    /// first to yield a value becomes the call's result and the registered
    /// function is never invoked.
    pub fn on_rmi(
        &self,
        pattern: &str,
        interceptor: impl Fn(Arc<Client>, String, Vec<Value>) -> BoxFuture<'static, Option<Value>>
        + Send
        + Sync
        + 'static,
    ) -> SyncsResult<()> {
        self.rmi.add_interceptor(pattern, interceptor)
    }

    /// Every client currently in the registry, online or not.
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.iter().map(|e| e.value().clone()).collect()
    }

    /// Looks up a registered client by socket id.
    pub fn client(&self, socket_id: &str) -> Option<Arc<Client>> {
        self.clients.get(socket_id).map(|e| e.value().clone())
    }

    /// Enables the verbose protocol dump at runtime.
    pub fn enable_debug_mode(&self) {
        self.debug.store(true, Ordering::Relaxed);
    }

    /// Disables the verbose protocol dump at runtime.
    pub fn disable_debug_mode(&self) {
        self.debug.store(false, Ordering::Relaxed);
    }

    pub(crate) fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}
