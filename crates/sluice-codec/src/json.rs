//! JSON codec
//!
//! Uses the serde shape of the canonical types: camelCase keys, absent
//! optional fields omitted, `null` only inside argument lists.

use serde::Serialize;
use serde::de::DeserializeOwned;

use sluice_core::{DecodeError, EncodeError};

use crate::codec::{EventDecoder, EventEncoder, finish_encode};
use crate::compression;

/// JSON codec for any serde-shaped canonical event
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    compressed: bool,
}

impl JsonCodec {
    pub fn new(compressed: bool) -> Self {
        Self { compressed }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

impl<E> EventEncoder<E> for JsonCodec
where
    E: Serialize,
{
    fn encode(&self, event: &E) -> Result<Vec<u8>, EncodeError> {
        let payload =
            serde_json::to_vec(event).map_err(|e| EncodeError::serialization(e.to_string()))?;
        finish_encode(payload, self.compressed)
    }
}

impl<E> EventDecoder<E> for JsonCodec
where
    E: DeserializeOwned,
{
    fn decode(&self, bytes: &[u8]) -> Result<E, DecodeError> {
        let bytes = compression::maybe_gunzip(bytes)?;
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))
    }
}
