// tests/unit_group_test.rs

mod common;

use common::{connect, handshake};
use serde_json::json;
use syncs::server::SyncsServer;

#[tokio::test]
async fn group_is_created_lazily_and_retained() {
    let server = SyncsServer::with_defaults();
    let group = server.group("room");
    assert!(group.is_empty());
    // Same registry entry on every lookup.
    assert!(std::sync::Arc::ptr_eq(&group, &server.group("room")));
}

#[tokio::test]
async fn membership_is_bidirectional() {
    let server = SyncsServer::with_defaults();
    let (connection, _transport) = connect(&server);
    handshake(&server, &connection, "peer-1");
    let client = connection.client();

    let group = server.group("room");
    group.add(&client);
    assert!(group.contains(&client));
    assert_eq!(client.groups(), vec!["room".to_string()]);

    group.remove(&client);
    assert!(!group.contains(&client));
    assert!(client.groups().is_empty());
}

#[tokio::test]
async fn add_replicates_group_shared_state_as_full_snapshot() {
    let server = SyncsServer::with_defaults();
    let group = server.group("room");
    let board = group.shared("board");
    board.set("topic", json!("planning"));
    board.set("open", json!(true));

    let (connection, transport) = connect(&server);
    handshake(&server, &connection, "peer-1");
    transport.clear();

    group.add(&connection.client());

    let syncs = transport.commands_of_type("sync");
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0]["name"], json!("board"));
    assert_eq!(syncs[0]["scope"], json!("GROUP"));
    assert_eq!(syncs[0]["group"], json!("room"));
    assert_eq!(syncs[0]["values"], json!({"topic": "planning", "open": true}));
}

#[tokio::test]
async fn group_shared_write_broadcasts_only_to_members() {
    let server = SyncsServer::with_defaults();
    let (member, member_transport) = connect(&server);
    handshake(&server, &member, "member");
    let (outsider, outsider_transport) = connect(&server);
    handshake(&server, &outsider, "outsider");

    let group = server.group("x");
    group.add(&member.client());
    member_transport.clear();
    outsider_transport.clear();

    group.shared("s").set("k", json!(7));

    let member_syncs = member_transport.commands_of_type("sync");
    assert_eq!(member_syncs.len(), 1);
    assert_eq!(member_syncs[0]["values"], json!({"k": 7}));
    assert!(outsider_transport.commands_of_type("sync").is_empty());
}

#[tokio::test]
async fn group_publish_reaches_members_and_reports_offline() {
    let server = SyncsServer::with_defaults();
    let (online, online_transport) = connect(&server);
    handshake(&server, &online, "online-peer");
    let (offline, _offline_transport) = connect(&server);
    handshake(&server, &offline, "offline-peer");

    let group = server.group("room");
    group.add(&online.client());
    group.add(&offline.client());
    server.handle_close(&offline);
    online_transport.clear();

    let rejected = group.publish("tick", json!(1));
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].socket_id(), Some("offline-peer".to_string()));

    let events = online_transport.commands_of_type("event");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"], json!("tick"));
    assert_eq!(events[0]["data"], json!(1));
}

#[tokio::test]
async fn except_produces_unregistered_view() {
    let server = SyncsServer::with_defaults();
    let (a, a_transport) = connect(&server);
    handshake(&server, &a, "a");
    let (b, b_transport) = connect(&server);
    handshake(&server, &b, "b");

    let group = server.group("room");
    group.add(&a.client());
    group.add(&b.client());
    a_transport.clear();
    b_transport.clear();

    let view = group.except(&[&a.client()]);
    assert_eq!(view.name(), "room_excluded");
    assert_eq!(view.len(), 1);
    // The view is a throwaway: the registry still resolves "room_excluded"
    // to a fresh empty group, not to this snapshot.
    assert!(server.group("room_excluded").is_empty());

    view.publish("ping", json!(null));
    assert!(a_transport.commands_of_type("event").is_empty());
    assert_eq!(b_transport.commands_of_type("event").len(), 1);

    // The original group is untouched.
    assert_eq!(group.len(), 2);
}

#[tokio::test]
async fn group_send_delivers_raw_messages() {
    let server = SyncsServer::with_defaults();
    let (connection, transport) = connect(&server);
    handshake(&server, &connection, "peer-1");
    let group = server.group("room");
    group.add(&connection.client());
    transport.clear();

    let rejected = group.send(&json!({"raw": true}));
    assert!(rejected.is_empty());
    assert_eq!(transport.sent_values(), vec![json!({"raw": true})]);
}
