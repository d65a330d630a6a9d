//! Error types for roomsync core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid operation ID: {0}")]
    InvalidOpId(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Invalid metadata value for key '{key}': {reason}")]
    InvalidMetadata { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias for roomsync core operations
pub type Result<T> = std::result::Result<T, Error>;
