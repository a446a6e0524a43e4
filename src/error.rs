//! Crate-wide error type

use crate::bus::BusError;

/// Errors surfaced by the server and transport layers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket-level failure (bind, serve)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bus rejected an operation
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Notification could not be encoded or decoded as JSON
    #[error("notification encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing to the client connection failed
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] std::io::Error),
}

/// Result alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
