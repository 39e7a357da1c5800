//! Binary tag-length-value codec
//!
//! Events are written as protobuf messages. Fields are versioned by presence:
//! a reader ignores tags it does not know and an absent scalar decodes to its
//! zero value (or `None` where the canonical field is optional). Every record
//! also carries a layout version, so an event with no fields set still encodes
//! to a non-empty payload and is never mistaken for an empty frame.

pub mod proto;

use prost::Message;

use sluice_core::{AccessEvent, DecodeError, EncodeError, LoggingEvent};

use crate::codec::{EventDecoder, EventEncoder, finish_encode};
use crate::compression;

pub use proto::{AccessEventProto, LoggingEventProto, StringMapProto, WIRE_VERSION};

/// Protobuf-style codec for both canonical event types
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec {
    compressed: bool,
}

impl BinaryCodec {
    pub fn new(compressed: bool) -> Self {
        Self { compressed }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

fn decode_message<M: Message + Default>(bytes: &[u8]) -> Result<M, DecodeError> {
    let bytes = compression::maybe_gunzip(bytes)?;
    M::decode(bytes.as_ref()).map_err(|e| DecodeError::binary(e.to_string()))
}

impl EventEncoder<LoggingEvent> for BinaryCodec {
    fn encode(&self, event: &LoggingEvent) -> Result<Vec<u8>, EncodeError> {
        finish_encode(LoggingEventProto::from(event).encode_to_vec(), self.compressed)
    }
}

impl EventDecoder<LoggingEvent> for BinaryCodec {
    fn decode(&self, bytes: &[u8]) -> Result<LoggingEvent, DecodeError> {
        LoggingEvent::try_from(decode_message::<LoggingEventProto>(bytes)?)
    }
}

impl EventEncoder<AccessEvent> for BinaryCodec {
    fn encode(&self, event: &AccessEvent) -> Result<Vec<u8>, EncodeError> {
        finish_encode(AccessEventProto::from(event).encode_to_vec(), self.compressed)
    }
}

impl EventDecoder<AccessEvent> for BinaryCodec {
    fn decode(&self, bytes: &[u8]) -> Result<AccessEvent, DecodeError> {
        AccessEvent::try_from(decode_message::<AccessEventProto>(bytes)?)
    }
}
