// src/core/protocol/mod.rs

pub mod encoding;
pub mod envelope;

pub use encoding::{escape, unescape};
pub use envelope::CommandEnvelope;
