//! # Sluice Ingest
//!
//! Moves events from their origin into buffers.
//!
//! ```text
//!  TCP clients ──► ServerSocketDispatcher ──┐ one StreamEventProducer per connection
//!  buffer files ──► FileSource ─────────────┤
//!  in-process ───► InProcessSource ─────────┴──► AppendOperation<EventWrapper<E>>
//! ```
//!
//! Every source has its own contiguous sequence of local ids starting at 1
//! and ends with exactly one terminal sentinel. Sources never block each
//! other: each producer reads, decodes and appends on its own task.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sluice_codec::CodecContext;
//! use sluice_core::LoggingEvent;
//! use sluice_ingest::{IngestConfig, ServerSocketDispatcher, SharedBuffer};
//! use sluice_storage::CircularBuffer;
//!
//! let config = IngestConfig::load("sluice.toml")?;
//! let decoder = CodecContext::new().decoder_for::<LoggingEvent>(config.format, config.compressed);
//! let buffer = Arc::new(CircularBuffer::new(config.buffer_capacity));
//!
//! let dispatcher = ServerSocketDispatcher::bind(&config, decoder, Arc::new(SharedBuffer::new(buffer))).await?;
//! dispatcher.start()?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod file_source;
pub mod in_process;
pub mod producer;
pub mod registry;

// Re-exports
pub use config::{DEFAULT_BIND_ADDRESS, DEFAULT_MAX_FRAME_LENGTH, IngestConfig};
pub use dispatcher::{BufferProvider, ServerSocketDispatcher, SharedBuffer};
pub use error::{IngestError, IngestResult};
pub use file_source::FileSource;
pub use in_process::InProcessSource;
pub use producer::{ProducerState, ProducerStats, ProducerStatsSnapshot, StreamEventProducer};
pub use registry::{SourceLease, SourceRegistry};
