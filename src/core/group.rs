// src/core/group.rs

//! Named broadcast/replication scopes.

use crate::core::client::Client;
use crate::core::shared::SharedObject;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A named, mutable set of clients supporting broadcast send/publish and
/// group-scoped shared state.
///
/// Groups are created lazily on first reference and retained for the
/// process lifetime, even when empty. Membership is bidirectional: adding
/// or removing a client updates both the group's set and the client's own
/// membership set.
#[derive(Debug)]
pub struct Group {
    name: String,
    clients: Mutex<HashMap<u64, Arc<Client>>>,
    shared_objects: Mutex<HashMap<String, Arc<SharedObject>>>,
}

impl Group {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            clients: Mutex::new(HashMap::new()),
            shared_objects: Mutex::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a client and immediately replicates every shared object owned
    /// by this group to it as a full snapshot.
    pub fn add(self: &Arc<Self>, client: &Arc<Client>) {
        self.clients
            .lock()
            .insert(client.session_id(), client.clone());
        client.join_group(&self.name);
        let shared_objects: Vec<_> = self.shared_objects.lock().values().cloned().collect();
        for shared in shared_objects {
            shared.send_sync_command(client, None);
        }
    }

    /// Removes a client from both membership sets.
    pub fn remove(&self, client: &Arc<Client>) {
        self.clients.lock().remove(&client.session_id());
        client.leave_group(&self.name);
    }

    /// True when the client is a current member.
    pub fn contains(&self, client: &Arc<Client>) -> bool {
        self.clients.lock().contains_key(&client.session_id())
    }

    /// A throwaway view of this group minus the given clients. The view is
    /// not registered anywhere and owns no shared state; it exists so a
    /// broadcast can skip, say, the sender.
    pub fn except(&self, excluded: &[&Arc<Client>]) -> Arc<Group> {
        let mut clients = self.clients.lock().clone();
        for client in excluded {
            clients.remove(&client.session_id());
        }
        Arc::new(Group {
            name: format!("{}_excluded", self.name),
            clients: Mutex::new(clients),
            shared_objects: Mutex::new(HashMap::new()),
        })
    }

    /// Sends a plain application message to every member. Returns the
    /// members that were offline and could not accept delivery.
    pub fn send(&self, message: &Value) -> Vec<Arc<Client>> {
        let mut rejected = Vec::new();
        for client in self.clients() {
            if !client.send(message) {
                rejected.push(client);
            }
        }
        rejected
    }

    /// Publishes an event to every member. Returns the members that were
    /// offline and could not accept delivery.
    pub fn publish(&self, event: &str, data: Value) -> Vec<Arc<Client>> {
        let mut rejected = Vec::new();
        for client in self.clients() {
            if !client.publish(event, data.clone()) {
                rejected.push(client);
            }
        }
        rejected
    }

    /// Returns the group-scoped shared object `name`, creating it read-only
    /// for clients on first access.
    pub fn shared(self: &Arc<Self>, name: &str) -> Arc<SharedObject> {
        self.shared_objects
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| SharedObject::group_level(name, self, Map::new(), true))
            .clone()
    }

    /// The current member set, snapshotted at call time. Membership changes
    /// after the snapshot do not affect a broadcast already in progress.
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}
