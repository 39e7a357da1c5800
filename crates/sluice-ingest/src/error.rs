//! Error types for sluice-ingest

use thiserror::Error;

use sluice_core::{BufferError, ConversionError, DecodeError, TransportError};
use sluice_storage::StorageError;

/// Errors that can occur while setting up or driving ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    /// `start()` was called a second time
    #[error("Already started")]
    AlreadyStarted,

    /// The producer or source was closed before the operation
    #[error("Closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A converter was paired with the wrong foreign event type
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// The worker task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Task(String),
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}

impl IngestError {
    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
