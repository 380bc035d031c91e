//! Error types for epacta ingestion.

use thiserror::Error;

use crate::store::EventKey;

/// Errors that can occur while decoding feeds or touching the event store.
#[derive(Error, Debug)]
pub enum EpactaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Event not found: {0}")]
    EventNotFound(EventKey),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EpactaError {
    fn from(err: serde_json::Error) -> Self {
        EpactaError::Serialization(err.to_string())
    }
}

/// Result type alias for epacta operations.
pub type EpactaResult<T> = Result<T, EpactaError>;
