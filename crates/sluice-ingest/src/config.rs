//! Configuration for socket and file ingestion

use std::path::Path;

use serde::{Deserialize, Serialize};

use sluice_codec::framing::MAX_FRAME_LENGTH;
use sluice_codec::{ContentFormat, ContentType, FrameCodec, Framing};
use sluice_logging::LogConfig;
use sluice_storage::DEFAULT_CAPACITY;

use crate::error::{IngestError, IngestResult};

/// Default listen address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:4445";

/// Default upper bound on a single frame's payload
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Ingestion configuration
///
/// Every field has a default, so a TOML file only needs the values it changes:
///
/// ```toml
/// bind_address = "127.0.0.1:4560"
/// format = "xml"
/// compressed = true
///
/// [logging]
/// default_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Address the socket dispatcher listens on
    pub bind_address: String,
    /// Framing of incoming streams
    pub framing: Framing,
    /// Event type carried by incoming streams
    pub content_type: ContentType,
    /// Payload encoding of incoming streams
    pub format: ContentFormat,
    /// Whether payloads are gzip-compressed
    pub compressed: bool,
    /// Largest payload accepted in one frame
    pub max_frame_length: usize,
    /// Elements kept per source buffer
    pub buffer_capacity: usize,
    /// Logging setup
    pub logging: LogConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            framing: Framing::LengthPrefixed,
            content_type: ContentType::Logging,
            format: ContentFormat::Protobuf,
            compressed: false,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            buffer_capacity: DEFAULT_CAPACITY,
            logging: LogConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> IngestResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| IngestError::config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> IngestResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            IngestError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.max_frame_length == 0 || self.max_frame_length > MAX_FRAME_LENGTH {
            return Err(IngestError::config(format!(
                "max_frame_length must be between 1 and {}",
                MAX_FRAME_LENGTH
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(IngestError::config("buffer_capacity must be positive"));
        }
        Ok(())
    }

    /// Frame codec for incoming streams
    pub fn frame_codec(&self) -> FrameCodec {
        self.framing.codec(self.max_frame_length)
    }

    /// Set the listen address
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Set the stream framing
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Set the carried event type
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Set the payload encoding
    pub fn with_format(mut self, format: ContentFormat) -> Self {
        self.format = format;
        self
    }

    /// Set whether payloads are gzip-compressed
    pub fn with_compression(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Set the frame size limit
    pub fn with_max_frame_length(mut self, max: usize) -> Self {
        self.max_frame_length = max;
        self
    }

    /// Set the per-source buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the logging configuration
    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }
}
