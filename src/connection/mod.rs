// src/connection/mod.rs

//! The transport seam and per-transport session state. The engine never
//! opens sockets itself; an embedding listener hands it one [`Transport`]
//! per client attempt and pushes inbound text and the close notification
//! through [`crate::server::SyncsServer`].

mod session;
mod transport;

pub use session::Connection;
pub use transport::{Transport, TransportError};
