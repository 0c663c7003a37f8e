// src/core/shared.rs

//! The shared-state replicator: named, scoped key/value containers that
//! broadcast diffs to the clients observing them.

use crate::core::client::Client;
use crate::core::group::Group;
use crate::core::protocol::CommandEnvelope;
use crate::server::SyncsServer;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Who may write a shared object and who receives its broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedScope {
    /// Every client in the server's registry.
    Global,
    /// The owning group's current members.
    Group,
    /// The single owning client.
    Client,
}

impl SharedScope {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            SharedScope::Global => "GLOBAL",
            SharedScope::Group => "GROUP",
            SharedScope::Client => "CLIENT",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "GLOBAL" => Some(SharedScope::Global),
            "GROUP" => Some(SharedScope::Group),
            "CLIENT" => Some(SharedScope::Client),
            _ => None,
        }
    }
}

/// Which side performed a mutation, as seen by the change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Server,
    Client,
}

/// The changed subset handed to a change observer.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub values: Map<String, Value>,
    pub by: ChangeOrigin,
}

type ChangeObserver = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Exactly one owner per scope.
enum SharedOwner {
    Global(Weak<SyncsServer>),
    Group(Weak<Group>),
    Client(Weak<Client>),
}

/// A replicated key/value container.
///
/// Server-side writes through [`set`] broadcast a single-key diff to every
/// currently-online member of the scope and fire the change observer.
/// Client-originated writes are accepted only for CLIENT scope with the
/// read-only gate open, mutate local state without any rebroadcast, and
/// fire the observer with [`ChangeOrigin::Client`].
///
/// [`set`]: SharedObject::set
pub struct SharedObject {
    name: String,
    scope: SharedScope,
    read_only: bool,
    owner: SharedOwner,
    values: Mutex<Map<String, Value>>,
    observer: Mutex<Option<ChangeObserver>>,
}

impl std::fmt::Debug for SharedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedObject")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl SharedObject {
    fn new(
        name: &str,
        scope: SharedScope,
        owner: SharedOwner,
        initial: Map<String, Value>,
        read_only: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            scope,
            read_only,
            owner,
            values: Mutex::new(initial),
            observer: Mutex::new(None),
        })
    }

    pub(crate) fn global_level(
        name: &str,
        server: &Arc<SyncsServer>,
        initial: Map<String, Value>,
        read_only: bool,
    ) -> Arc<Self> {
        Self::new(
            name,
            SharedScope::Global,
            SharedOwner::Global(Arc::downgrade(server)),
            initial,
            read_only,
        )
    }

    pub(crate) fn group_level(
        name: &str,
        group: &Arc<Group>,
        initial: Map<String, Value>,
        read_only: bool,
    ) -> Arc<Self> {
        Self::new(
            name,
            SharedScope::Group,
            SharedOwner::Group(Arc::downgrade(group)),
            initial,
            read_only,
        )
    }

    pub(crate) fn client_level(
        name: &str,
        client: &Arc<Client>,
        initial: Map<String, Value>,
        read_only: bool,
    ) -> Arc<Self> {
        Self::new(
            name,
            SharedScope::Client,
            SharedOwner::Client(Arc::downgrade(client)),
            initial,
            read_only,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> SharedScope {
        self.scope
    }

    /// Whether client-originated writes are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Reads a key. Nonexistent keys read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        self.values.lock().get(key).cloned().unwrap_or(Value::Null)
    }

    /// A snapshot of the full values map.
    pub fn values(&self) -> Map<String, Value> {
        self.values.lock().clone()
    }

    /// Server-side write: mutates the map, broadcasts a diff containing
    /// only this key to every currently-online member of the scope
    /// (offline members are skipped, not queued), then fires the change
    /// observer with origin [`ChangeOrigin::Server`].
    pub fn set(&self, key: &str, value: Value) {
        self.values.lock().insert(key.to_string(), value.clone());
        for client in self.scope_clients() {
            self.send_sync_command(&client, Some(key));
        }
        self.notify_observer(key, value, ChangeOrigin::Server);
    }

    /// Registers the change observer. The most recent registration
    /// replaces any previous one.
    pub fn on_change(&self, observer: impl Fn(&ChangeEvent) + Send + Sync + 'static) {
        *self.observer.lock() = Some(Arc::new(observer));
    }

    /// Replicates this object to one client: a single-key diff when `key`
    /// is given, the entire current values map otherwise (used for initial
    /// replication on handshake and group join). Offline clients are
    /// skipped.
    pub(crate) fn send_sync_command(&self, client: &Arc<Client>, key: Option<&str>) {
        if !client.is_online() {
            return;
        }
        let values = match key {
            Some(key) => {
                let mut diff = Map::new();
                diff.insert(key.to_string(), self.get(key));
                diff
            }
            None => self.values(),
        };
        let group = match &self.owner {
            SharedOwner::Group(group) => group.upgrade().map(|g| g.name().to_string()),
            _ => None,
        };
        let command = CommandEnvelope::SyncState {
            name: self.name.clone(),
            scope: self.scope,
            values,
            group,
        };
        if let Err(e) = client.send_command(&command) {
            debug!(name = %self.name, "failed to send sync command: {e}");
        }
    }

    /// Applies a client-originated write: accepted only when the read-only
    /// gate is open and the key already exists. Updates local state and
    /// fires the observer with origin [`ChangeOrigin::Client`], but never
    /// rebroadcasts.
    pub(crate) fn apply_client_write(&self, key: &str, value: Value) {
        {
            let mut values = self.values.lock();
            if self.read_only || !values.contains_key(key) {
                trace!(name = %self.name, key, "client write rejected by read-only gate");
                return;
            }
            values.insert(key.to_string(), value.clone());
        }
        self.notify_observer(key, value, ChangeOrigin::Client);
    }

    /// The clients that should observe this object right now.
    fn scope_clients(&self) -> Vec<Arc<Client>> {
        match &self.owner {
            SharedOwner::Global(server) => server.upgrade().map(|s| s.clients()).unwrap_or_default(),
            SharedOwner::Group(group) => group.upgrade().map(|g| g.clients()).unwrap_or_default(),
            SharedOwner::Client(client) => client.upgrade().into_iter().collect(),
        }
    }

    fn notify_observer(&self, key: &str, value: Value, by: ChangeOrigin) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            let mut values = Map::new();
            values.insert(key.to_string(), value);
            observer(&ChangeEvent { values, by });
        }
    }
}
