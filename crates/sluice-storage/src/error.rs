//! Error types for sluice-storage

use thiserror::Error;

use sluice_core::{DecodeError, EncodeError, FramingError, SluiceError};

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// The file does not start with a valid header, or the header does not
    /// match what the caller expects
    #[error("Invalid file header: {0}")]
    InvalidHeader(String),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// The file was closed and cannot be written any more
    #[error("Event file closed")]
    Closed,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<SluiceError> for StorageError {
    fn from(err: SluiceError) -> Self {
        match err {
            SluiceError::Framing(e) => StorageError::Framing(e),
            SluiceError::Decode(e) => StorageError::Decode(e),
            SluiceError::Encode(e) => StorageError::Encode(e),
            other => StorageError::Io(other.to_string()),
        }
    }
}

impl StorageError {
    /// Create a new InvalidHeader error
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}
