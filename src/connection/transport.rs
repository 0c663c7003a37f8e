// src/connection/transport.rs

//! The duplex channel contract the embedding listener must satisfy.

use thiserror::Error;

/// Errors a transport may report on send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("transport send failed: {0}")]
    SendFailed(String),
}

/// One duplex channel per client attempt.
///
/// The implementation must deliver whole text messages reliably and in
/// order, and emit exactly one close notification per connection (by
/// calling [`crate::server::SyncsServer::handle_close`]). Inbound messages
/// are pushed via [`crate::server::SyncsServer::handle_message`]. The
/// engine assumes no reordering and no partial frames.
///
/// `send` must not block: a typical implementation enqueues the frame on an
/// unbounded channel drained by the socket writer task.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Queues one text frame for delivery.
    fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Asks the transport to close. The close notification is still
    /// expected to arrive through the normal path.
    fn close(&self);
}
