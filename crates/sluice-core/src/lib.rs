//! # Sluice Core
//!
//! Canonical event model, identities and errors shared by every sluice crate.
//!
//! Every ingestion path (socket, file, in-process) converges on the types in
//! this crate:
//!
//! - [`LoggingEvent`] and [`AccessEvent`]: the codec-agnostic canonical events
//! - [`SourceIdentifier`]: the origin of a stream of events
//! - [`EventIdentifier`]: a source plus its local sequence number
//! - [`EventWrapper`]: the envelope appended to buffers, where a missing
//!   payload marks the end of a source
//! - [`AppendOperation`]: the only capability ingestion needs from a buffer

pub mod access;
pub mod buffer;
pub mod error;
pub mod event;
pub mod identity;
pub mod logging;

// Re-export main types
pub use access::*;
pub use buffer::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use logging::*;
