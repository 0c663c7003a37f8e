// src/connection/session.rs

//! Defines the state associated with a single transport connection.

use crate::connection::Transport;
use crate::core::client::Client;
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-transport state: the transport itself and the client currently
/// bound to it.
///
/// A connection starts out bound to a provisional [`Client`]. When the
/// handshake identifies the peer as a known, offline client, the binding is
/// swapped to that existing object so every later message on this transport
/// is attributed to the surviving identity.
#[derive(Debug)]
pub struct Connection {
    transport: Arc<dyn Transport>,
    client: Mutex<Arc<Client>>,
}

impl Connection {
    pub(crate) fn new(transport: Arc<dyn Transport>, client: Arc<Client>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            client: Mutex::new(client),
        })
    }

    /// The client currently bound to this transport.
    pub fn client(&self) -> Arc<Client> {
        self.client.lock().clone()
    }

    /// The underlying transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Rebinds this transport to another client object (reconnection).
    pub(crate) fn rebind(&self, client: Arc<Client>) {
        *self.client.lock() = client;
    }
}
