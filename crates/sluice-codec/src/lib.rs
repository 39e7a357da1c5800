//! Stream framing and event codecs for sluice
//!
//! This crate turns byte streams into payloads and payloads into canonical
//! events, in both directions:
//!
//! - [`framing`]: length-prefixed and zero-delimited framing as
//!   `tokio_util` codecs, plus single-frame async helpers
//! - [`BinaryCodec`], [`XmlCodec`], [`JsonCodec`]: event codecs with an
//!   optional gzip layer
//! - [`FileHeader`]: header of persisted buffer files
//! - [`FramedEncoder`]: composed encoder strategy for the sending side
//! - [`CodecContext`]: shared codec instances selected by configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice_codec::{CodecContext, ContentFormat};
//! use sluice_core::LoggingEvent;
//!
//! let codecs = CodecContext::new();
//! let decoder = codecs.decoder_for::<LoggingEvent>(ContentFormat::Xml, false);
//! let event = decoder.decode(payload)?;
//! ```

pub mod binary;
pub mod codec;
pub mod compression;
pub mod context;
pub mod encoder;
pub mod framing;
pub mod header;
pub mod json;
pub mod xml;

// Re-exports for convenience
pub use binary::BinaryCodec;
pub use codec::{EventCodec, EventDecoder, EventEncoder};
pub use context::{CanonicalEvent, CodecContext};
pub use encoder::{FramedEncoder, StreamEncoder};
pub use framing::{
    FrameCodec, Framing, LengthPrefixedCodec, ZeroDelimitedCodec, read_frame, write_frame,
};
pub use header::{ContentFormat, ContentType, FileHeader};
pub use json::JsonCodec;
pub use xml::XmlCodec;
