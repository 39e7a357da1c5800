//! # Sluice Storage
//!
//! Destinations for ingested events.
//!
//! - [`CircularBuffer`]: bounded, append-only, concurrently readable
//!   in-memory buffer implementing [`AppendOperation`](sluice_core::AppendOperation)
//! - [`EventFileWriter`] / [`EventFileReader`]: persisted buffer files with a
//!   self-describing header
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice_core::{AppendOperation, EventWrapper, LoggingEvent};
//! use sluice_storage::CircularBuffer;
//!
//! let buffer: CircularBuffer<EventWrapper<LoggingEvent>> = CircularBuffer::new(1000);
//! buffer.add(wrapper)?;
//! let newest = buffer.get(buffer.total_added() - 1);
//! ```

pub mod buffer;
pub mod error;
pub mod file;

// Re-exports
pub use buffer::{CircularBuffer, DEFAULT_CAPACITY};
pub use error::{StorageError, StorageResult};
pub use file::{EventFileConfig, EventFileReader, EventFileWriter};
