//! Error types for sluice
//!
//! Framing and transport errors end the producer that hit them. Decode errors
//! only cost the one record they were raised for. Conversion errors point at a
//! misconfigured converter and are returned to the caller as-is.

use thiserror::Error;

/// Top-level error type for sluice
#[derive(Debug, Error)]
pub enum SluiceError {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Result alias using [`SluiceError`]
pub type SluiceResult<T> = Result<T, SluiceError>;

/// Errors raised while splitting a byte stream into frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("Invalid frame length: {0}")]
    InvalidLength(i32),

    #[error("Truncated stream: expected {expected} payload bytes, got {available}")]
    TruncatedStream { expected: usize, available: usize },

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Payload contains a NUL byte and cannot be zero-delimited")]
    EmbeddedNul,

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FramingError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => FramingError::UnexpectedEof,
            _ => FramingError::Io(err.to_string()),
        }
    }
}

/// Errors raised while turning one payload into a canonical event
///
/// Always recoverable: the record is skipped and the stream continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Character encoding error: {0}")]
    Encoding(String),

    #[error("Decompression failed: {0}")]
    Compression(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Binary decode error: {0}")]
    Binary(String),
}

impl DecodeError {
    /// Create a new Malformed error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Create a new Xml error
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create a new Binary error
    pub fn binary(message: impl Into<String>) -> Self {
        Self::Binary(message.into())
    }
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(err: std::str::Utf8Error) -> Self {
        DecodeError::Encoding(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DecodeError::Encoding(err.to_string())
    }
}

/// Errors raised while encoding a canonical event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

impl EncodeError {
    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }
}

/// A converter was handed an event of the wrong foreign type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Unexpected foreign event type, expected {expected}")]
    UnexpectedType { expected: &'static str },
}

/// Errors on the socket side of ingestion
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },

    #[error("Accept failed: {0}")]
    Accept(String),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by buffer append operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("Operation not supported by this buffer: {0}")]
    Unsupported(&'static str),

    #[error("Buffer full (capacity: {capacity})")]
    Full { capacity: usize },

    #[error("Buffer closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_error_display() {
        let err = FramingError::InvalidLength(-7);
        assert!(err.to_string().contains("-7"));

        let err = FramingError::TruncatedStream {
            expected: 10,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("3"));
    }

    #[test]
    fn test_io_eof_maps_to_unexpected_eof() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "early eof");
        assert_eq!(FramingError::from(io_err), FramingError::UnexpectedEof);

        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(FramingError::from(io_err), FramingError::Io(_)));
    }

    #[test]
    fn test_decode_error_helpers() {
        let err = DecodeError::xml("DOCTYPE not allowed");
        assert!(matches!(err, DecodeError::Xml(_)));
        assert!(err.to_string().contains("DOCTYPE"));
    }

    #[test]
    fn test_utf8_error_conversion() {
        let bytes = vec![0xff, 0xfe];
        let err: DecodeError = String::from_utf8(bytes).unwrap_err().into();
        assert!(matches!(err, DecodeError::Encoding(_)));
    }

    #[test]
    fn test_top_level_wraps_sub_errors() {
        let err: SluiceError = BufferError::Unsupported("add_all").into();
        assert!(format!("{}", err).contains("add_all"));

        let err: SluiceError = ConversionError::UnexpectedType { expected: "JulRecord" }.into();
        assert!(format!("{}", err).contains("JulRecord"));
    }
}
