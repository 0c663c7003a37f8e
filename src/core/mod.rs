// src/core/mod.rs

//! The central module containing the protocol engine's entities and logic.

pub mod client;
pub mod errors;
pub mod events;
pub mod group;
pub mod protocol;
pub mod rmi;
pub mod shared;

pub use client::Client;
pub use errors::{SyncsError, SyncsResult};
pub use group::Group;
pub use protocol::CommandEnvelope;
pub use shared::{ChangeEvent, ChangeOrigin, SharedObject, SharedScope};
