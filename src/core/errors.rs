// src/core/errors.rs

//! Defines the primary error type for the engine.

use thiserror::Error;

/// The main error enum, representing all possible failures within the engine.
#[derive(Error, Debug)]
pub enum SyncsError {
    #[error("transport error: {0}")]
    Transport(#[from] crate::connection::TransportError),

    #[error("malformed wire payload")]
    MalformedPayload,

    #[error("invalid interceptor pattern '{0}': {1}")]
    InvalidPattern(String, regex::Error),

    #[error("client is offline")]
    ClientOffline,

    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("remote call abandoned: the client was dropped before replying")]
    RemoteAbandoned,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SyncsResult<T> = Result<T, SyncsError>;
