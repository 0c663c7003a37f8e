// src/server/dispatch.rs

//! Demultiplexes inbound commands to the handshake, the event bus, the
//! shared-state replicator and the RMI engine.

use super::SyncsServer;
use crate::connection::Connection;
use crate::core::protocol::CommandEnvelope;
use std::sync::Arc;
use tracing::trace;

impl SyncsServer {
    pub(crate) fn on_command(self: &Arc<Self>, connection: &Connection, command: CommandEnvelope) {
        match command {
            CommandEnvelope::ReportSocketId { socket_id } => {
                self.handle_report_socket_id(connection, socket_id);
            }
            CommandEnvelope::Event { event, data } => {
                self.events.dispatch(&event, &data, &connection.client());
            }
            CommandEnvelope::SyncWrite { name, key, value } => {
                connection.client().apply_sync_write(&name, &key, value);
            }
            CommandEnvelope::Rmi { id, name, args } => {
                // RMI dispatch is the engine's only suspension point: the
                // interceptor chain and handlers are async, so the call runs
                // on its own task and later messages are not held up by it.
                let server = self.clone();
                let client = connection.client();
                tokio::spawn(async move {
                    server.rmi.dispatch(client, id, name, args).await;
                });
            }
            CommandEnvelope::RmiResult { id, result, error } => {
                connection.client().resolve_rmi(&id, result, error);
            }
            CommandEnvelope::GetSocketId
            | CommandEnvelope::SetSocketId { .. }
            | CommandEnvelope::SyncState { .. } => {
                // Server-to-client shapes; a peer sending them is ignored.
                trace!("ignoring server-bound command echoed by a client");
            }
        }
    }
}
