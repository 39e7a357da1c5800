//! Event codec capabilities

use sluice_core::{DecodeError, EncodeError};

use crate::compression;

/// Turns a canonical event into a payload
pub trait EventEncoder<E>: Send + Sync {
    fn encode(&self, event: &E) -> Result<Vec<u8>, EncodeError>;
}

/// Turns a payload back into a canonical event
///
/// A failed decode only costs the one payload: callers skip it and move on.
pub trait EventDecoder<E>: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<E, DecodeError>;
}

/// Both directions of a codec
pub trait EventCodec<E>: EventEncoder<E> + EventDecoder<E> {}

impl<E, T> EventCodec<E> for T where T: EventEncoder<E> + EventDecoder<E> {}

/// Apply the gzip layer on the way out
pub(crate) fn finish_encode(payload: Vec<u8>, compressed: bool) -> Result<Vec<u8>, EncodeError> {
    if compressed {
        compression::gzip(&payload)
    } else {
        Ok(payload)
    }
}
