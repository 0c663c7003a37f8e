// tests/common/mod.rs

//! Shared test fixtures: an in-memory transport and wire helpers.

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use syncs::connection::{Connection, Transport, TransportError};
use syncs::core::protocol::{escape, unescape};
use syncs::server::SyncsServer;

/// An in-memory transport that records every frame the engine sends.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every sent frame, unescaped and parsed back to JSON.
    pub fn sent_values(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|frame| {
                serde_json::from_str(&unescape(frame).expect("frame must unescape"))
                    .expect("frame must be JSON")
            })
            .collect()
    }

    /// Sent commands filtered by `type`.
    pub fn commands_of_type(&self, command_type: &str) -> Vec<Value> {
        self.sent_values()
            .into_iter()
            .filter(|v| v.get("type").and_then(Value::as_str) == Some(command_type))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for MockTransport {
    fn send(&self, text: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Sets up minimal tracing for tests (ignores the error when a subscriber
/// is already installed for this test binary).
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Connects a fresh mock transport to the engine.
pub fn connect(server: &Arc<SyncsServer>) -> (Arc<Connection>, Arc<MockTransport>) {
    init_tracing();
    let transport = MockTransport::new();
    let connection = server.accept(transport.clone());
    (connection, transport)
}

/// Pushes a JSON payload through the wire encoding into the engine.
pub fn push(server: &Arc<SyncsServer>, connection: &Connection, payload: &Value) {
    server.handle_message(connection, &escape(&payload.to_string()));
}

/// Completes the handshake by reporting the given socket id (empty string
/// asks the server to issue one).
pub fn handshake(server: &Arc<SyncsServer>, connection: &Connection, socket_id: &str) {
    push(
        server,
        connection,
        &serde_json::json!({"command": true, "type": "reportSocketId", "socketId": socket_id}),
    );
}

/// Polls until `predicate` holds, yielding to background tasks in between.
pub async fn wait_for(predicate: impl Fn() -> bool) {
    for _ in 0..500 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}
