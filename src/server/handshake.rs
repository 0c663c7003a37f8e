// src/server/handshake.rs

//! The handshake state machine: identity exchange, reconnection detection
//! and registry promotion.

use super::SyncsServer;
use crate::connection::Connection;
use crate::core::client::Client;
use crate::core::protocol::CommandEnvelope;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

impl SyncsServer {
    /// Sends (or re-sends) the identity request that opens the handshake.
    pub(crate) fn send_handshake_request(&self, client: &Arc<Client>) {
        if let Err(e) = client.send_command(&CommandEnvelope::GetSocketId) {
            warn!("failed to send handshake request: {e}");
        }
    }

    /// Handles the peer's identity report.
    ///
    /// A reported socket id is taken as-is; an empty report gets a freshly
    /// issued id echoed back via `setSocketId`. A reported id unknown to
    /// the registry is accepted as a new identity under that id (this keeps
    /// resume-across-restart working; the peer is trusted to assert its own
    /// identity, see the crate's security notes).
    pub(crate) fn handle_report_socket_id(
        self: &Arc<Self>,
        connection: &Connection,
        reported: String,
    ) {
        let client = connection.client();
        let socket_id = if reported.is_empty() {
            let issued = Uuid::new_v4().to_string();
            if let Err(e) = client.send_command(&CommandEnvelope::SetSocketId {
                socket_id: issued.clone(),
            }) {
                warn!("failed to send issued socket id: {e}");
            }
            issued
        } else {
            reported
        };
        client.set_socket_id(&socket_id);
        self.on_handshaken(connection, client, socket_id);
    }

    /// Registry decision after a confirmed socket id: rebind an existing
    /// client (reconnection) or register the provisional one (connection).
    /// Either way, the global shared-state namespace is then replicated to
    /// the fresh transport in full.
    fn on_handshaken(
        self: &Arc<Self>,
        connection: &Connection,
        provisional: Arc<Client>,
        socket_id: String,
    ) {
        let existing = self.clients.get(&socket_id).map(|e| e.value().clone());
        let client = match existing {
            Some(existing) => {
                // The surviving identity keeps its shared-state handles and
                // pending RMI correlations; only the transport is new.
                existing.rebind_transport(connection.transport());
                existing.set_online(true);
                connection.rebind(existing.clone());
                debug!(%socket_id, "client reconnected");
                self.listeners.fire_re_connection(&existing);
                existing
            }
            None => {
                provisional.set_online(true);
                self.clients.insert(socket_id.clone(), provisional.clone());
                debug!(%socket_id, "client connected");
                self.listeners.fire_connection(&provisional);
                provisional
            }
        };
        let shared_objects: Vec<_> = self
            .shared_objects
            .iter()
            .map(|e| e.value().clone())
            .collect();
        for shared in shared_objects {
            shared.send_sync_command(&client, None);
        }
    }
}
