// tests/unit_handshake_test.rs

mod common;

use common::{connect, handshake, push};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use syncs::server::SyncsServer;

#[tokio::test]
async fn accept_sends_handshake_request() {
    let server = SyncsServer::with_defaults();
    let (_connection, transport) = connect(&server);

    let sent = transport.sent_values();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], json!({"command": true, "type": "getSocketId"}));
}

#[tokio::test]
async fn empty_report_gets_issued_id_and_fires_connection() {
    let server = SyncsServer::with_defaults();
    let connections = Arc::new(AtomicUsize::new(0));
    let re_connections = Arc::new(AtomicUsize::new(0));
    {
        let connections = connections.clone();
        server.on_connection(move |_| {
            connections.fetch_add(1, Ordering::SeqCst);
        });
        let re_connections = re_connections.clone();
        server.on_re_connection(move |_| {
            re_connections.fetch_add(1, Ordering::SeqCst);
        });
    }

    let (connection, transport) = connect(&server);
    handshake(&server, &connection, "");

    let issued = transport.commands_of_type("setSocketId");
    assert_eq!(issued.len(), 1);
    let issued_id = issued[0]["socketId"].as_str().unwrap().to_string();
    assert!(!issued_id.is_empty());

    let client = connection.client();
    assert!(client.is_online());
    assert_eq!(client.socket_id(), Some(issued_id.clone()));
    assert!(server.client(&issued_id).is_some());
    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert_eq!(re_connections.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reported_id_is_accepted_without_issuing_a_new_one() {
    let server = SyncsServer::with_defaults();
    let (connection, transport) = connect(&server);
    handshake(&server, &connection, "carried-over-id");

    assert!(transport.commands_of_type("setSocketId").is_empty());
    assert_eq!(
        connection.client().socket_id(),
        Some("carried-over-id".to_string())
    );
    assert!(server.client("carried-over-id").is_some());
}

#[tokio::test]
async fn reconnect_rebinds_existing_client_object() {
    let server = SyncsServer::with_defaults();
    let (first_connection, _first_transport) = connect(&server);
    handshake(&server, &first_connection, "peer-1");
    let original = first_connection.client();
    original.set_data("note", json!("kept"));

    server.handle_close(&first_connection);
    assert!(!original.is_online());

    let re_connected: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let re_connected = re_connected.clone();
        server.on_re_connection(move |client| {
            re_connected.lock().push(client.socket_id().unwrap());
        });
    }

    let (second_connection, second_transport) = connect(&server);
    handshake(&server, &second_connection, "peer-1");

    // The connection is now bound to the surviving identity, not the
    // provisional client created for the new transport.
    let rebound = second_connection.client();
    assert!(Arc::ptr_eq(&rebound, &original));
    assert!(rebound.is_online());
    assert_eq!(rebound.get_data("note"), json!("kept"));
    assert_eq!(re_connected.lock().as_slice(), ["peer-1".to_string()]);

    // Traffic for the rebound client flows through the new transport.
    rebound.publish("hello", json!(1));
    assert_eq!(second_transport.commands_of_type("event").len(), 1);
}

#[tokio::test]
async fn non_command_before_identity_re_requests_handshake() {
    let server = SyncsServer::with_defaults();
    let messages = Arc::new(AtomicUsize::new(0));
    {
        let messages = messages.clone();
        server.on_message(move |_, _| {
            messages.fetch_add(1, Ordering::SeqCst);
        });
    }

    let (connection, transport) = connect(&server);
    transport.clear();
    push(&server, &connection, &json!({"hello": "world"}));

    // No message observer fired; the identity request was retransmitted.
    assert_eq!(messages.load(Ordering::SeqCst), 0);
    assert_eq!(transport.commands_of_type("getSocketId").len(), 1);
}

#[tokio::test]
async fn non_command_after_identity_reaches_message_observers() {
    let server = SyncsServer::with_defaults();
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        server.on_message(move |message, _| {
            seen.lock().push(message.clone());
        });
    }

    let (connection, _transport) = connect(&server);
    handshake(&server, &connection, "peer-1");
    push(&server, &connection, &json!({"hello": "world"}));

    assert_eq!(seen.lock().as_slice(), [json!({"hello": "world"})]);
}

#[tokio::test]
async fn malformed_payloads_are_dropped_silently() {
    let server = SyncsServer::with_defaults();
    let (connection, transport) = connect(&server);
    handshake(&server, &connection, "peer-1");
    transport.clear();

    server.handle_message(&connection, "%7Bnot json");
    server.handle_message(&connection, "%FF%FE");

    assert!(transport.sent_values().is_empty());
    assert!(connection.client().is_online());
}

#[tokio::test]
async fn handshake_replicates_global_shared_state() {
    let server = SyncsServer::with_defaults();
    let scores = server.shared("scores");
    scores.set("alice", json!(10));

    let (connection, transport) = connect(&server);
    handshake(&server, &connection, "peer-1");

    let syncs = transport.commands_of_type("sync");
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0]["name"], json!("scores"));
    assert_eq!(syncs[0]["scope"], json!("GLOBAL"));
    assert_eq!(syncs[0]["values"], json!({"alice": 10}));
    assert!(syncs[0].get("group").is_none());
}

#[tokio::test]
async fn pre_handshake_close_is_a_no_op() {
    let server = SyncsServer::with_defaults();
    let closes = Arc::new(AtomicUsize::new(0));
    {
        let closes = closes.clone();
        server.on_client_disconnect(move |_| {
            closes.fetch_add(1, Ordering::SeqCst);
        });
    }

    let (connection, _transport) = connect(&server);
    server.handle_close(&connection);

    assert_eq!(closes.load(Ordering::SeqCst), 0);
    assert!(server.clients().is_empty());
}

#[tokio::test]
async fn duplicate_transport_for_unknown_mock_still_gets_requests() {
    // Two provisional transports may handshake independently; each ends up
    // registered under its own id.
    let server = SyncsServer::with_defaults();
    let (first, _t1) = connect(&server);
    let (second, _t2) = connect(&server);
    handshake(&server, &first, "a");
    handshake(&server, &second, "b");
    assert_eq!(server.clients().len(), 2);
    assert!(!Arc::ptr_eq(&first.client(), &second.client()));
}
