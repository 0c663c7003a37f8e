// src/core/protocol/envelope.rs

//! The single tagged message shape multiplexing all protocol traffic.
//!
//! On the wire an envelope is a flat JSON object carrying `command: true`,
//! a `type` discriminator and the type-specific fields. The `sync` type has
//! two field shapes depending on direction (a state broadcast going out, a
//! single-key write coming in), so conversion is hand-rolled rather than
//! derived.

use crate::core::shared::SharedScope;
use serde_json::{Map, Value, json};

/// A decoded protocol command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEnvelope {
    /// Handshake request (server to client, no payload).
    GetSocketId,
    /// Identity report (client to server); `socket_id` is empty when the
    /// client holds no identity yet.
    ReportSocketId { socket_id: String },
    /// Newly issued identity (server to client).
    SetSocketId { socket_id: String },
    /// Event publish, either direction.
    Event { event: String, data: Value },
    /// Shared-state broadcast (server to client): a diff or full snapshot.
    SyncState {
        name: String,
        scope: SharedScope,
        values: Map<String, Value>,
        group: Option<String>,
    },
    /// Shared-state write (client to server, CLIENT scope only).
    SyncWrite {
        name: String,
        key: String,
        value: Value,
    },
    /// Remote method invocation request, either direction.
    Rmi {
        id: String,
        name: String,
        args: Vec<Value>,
    },
    /// Remote method invocation reply, either direction.
    RmiResult {
        id: String,
        result: Value,
        error: Option<String>,
    },
}

impl CommandEnvelope {
    /// True when a parsed payload carries the protocol-command discriminator
    /// and a `type` tag. Payloads without it are application messages.
    pub fn is_command(value: &Value) -> bool {
        value.get("command") == Some(&Value::Bool(true)) && value.get("type").is_some()
    }

    /// Serializes the envelope to the flat wire object, including the
    /// `command: true` discriminator.
    pub fn to_value(&self) -> Value {
        match self {
            CommandEnvelope::GetSocketId => json!({"command": true, "type": "getSocketId"}),
            CommandEnvelope::ReportSocketId { socket_id } => {
                json!({"command": true, "type": "reportSocketId", "socketId": socket_id})
            }
            CommandEnvelope::SetSocketId { socket_id } => {
                json!({"command": true, "type": "setSocketId", "socketId": socket_id})
            }
            CommandEnvelope::Event { event, data } => {
                json!({"command": true, "type": "event", "event": event, "data": data})
            }
            CommandEnvelope::SyncState {
                name,
                scope,
                values,
                group,
            } => {
                let mut object = json!({
                    "command": true,
                    "type": "sync",
                    "name": name,
                    "scope": scope.as_wire_str(),
                    "values": values,
                });
                // The group name is only present for GROUP scope.
                if let (Some(group), Some(map)) = (group, object.as_object_mut()) {
                    map.insert("group".to_string(), Value::String(group.clone()));
                }
                object
            }
            CommandEnvelope::SyncWrite { name, key, value } => {
                json!({"command": true, "type": "sync", "name": name, "key": key, "value": value})
            }
            CommandEnvelope::Rmi { id, name, args } => {
                json!({"command": true, "type": "rmi", "id": id, "name": name, "args": args})
            }
            CommandEnvelope::RmiResult { id, result, error } => {
                json!({"command": true, "type": "rmi-result", "id": id, "result": result, "error": error})
            }
        }
    }

    /// Decodes a parsed wire object into a typed envelope.
    ///
    /// Returns `None` for anything that is not a well-formed command of a
    /// known type; the caller drops those silently.
    pub fn from_value(value: &Value) -> Option<CommandEnvelope> {
        if !Self::is_command(value) {
            return None;
        }
        let object = value.as_object()?;
        match object.get("type")?.as_str()? {
            "getSocketId" => Some(CommandEnvelope::GetSocketId),
            "reportSocketId" => Some(CommandEnvelope::ReportSocketId {
                socket_id: object
                    .get("socketId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "setSocketId" => Some(CommandEnvelope::SetSocketId {
                socket_id: object.get("socketId")?.as_str()?.to_string(),
            }),
            "event" => Some(CommandEnvelope::Event {
                event: object.get("event")?.as_str()?.to_string(),
                data: object.get("data").cloned().unwrap_or(Value::Null),
            }),
            "sync" => {
                let name = object.get("name")?.as_str()?.to_string();
                if let Some(key) = object.get("key") {
                    Some(CommandEnvelope::SyncWrite {
                        name,
                        key: key.as_str()?.to_string(),
                        value: object.get("value").cloned().unwrap_or(Value::Null),
                    })
                } else {
                    Some(CommandEnvelope::SyncState {
                        name,
                        scope: SharedScope::from_wire_str(object.get("scope")?.as_str()?)?,
                        values: object.get("values")?.as_object()?.clone(),
                        group: object
                            .get("group")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                    })
                }
            }
            "rmi" => Some(CommandEnvelope::Rmi {
                id: object.get("id")?.as_str()?.to_string(),
                name: object.get("name")?.as_str()?.to_string(),
                args: object
                    .get("args")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            }),
            "rmi-result" => Some(CommandEnvelope::RmiResult {
                id: object.get("id")?.as_str()?.to_string(),
                result: object.get("result").cloned().unwrap_or(Value::Null),
                error: object
                    .get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            _ => None,
        }
    }
}
