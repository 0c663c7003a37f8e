// src/lib.rs

//! Syncs is a stateful real-time synchronization engine. It multiplexes a
//! handshake/identity protocol, named broadcast groups, replicated shared
//! state, remote method invocation and event pub/sub over a single tagged
//! command protocol carried by one transport per client.

pub mod config;
pub mod connection;
pub mod core;
pub mod server;

// Re-export
pub use crate::config::Config;
pub use crate::core::SyncsError;
pub use crate::server::SyncsServer;
