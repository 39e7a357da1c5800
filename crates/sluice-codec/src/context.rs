//! Shared codec instances, built once and passed down

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use sluice_core::{AccessEvent, DecodeError, LoggingEvent};

use crate::binary::BinaryCodec;
use crate::codec::{EventDecoder, EventEncoder};
use crate::header::{ContentFormat, ContentType, FileHeader};
use crate::json::JsonCodec;
use crate::xml::XmlCodec;

/// A canonical event type that every codec can carry
pub trait CanonicalEvent:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const CONTENT_TYPE: ContentType;
}

impl CanonicalEvent for LoggingEvent {
    const CONTENT_TYPE: ContentType = ContentType::Logging;
}

impl CanonicalEvent for AccessEvent {
    const CONTENT_TYPE: ContentType = ContentType::Access;
}

/// Owns one instance of every codec variant
///
/// Created at startup and handed to producers, writers and file sources,
/// which pick their codec from configuration or a file header.
#[derive(Debug, Clone)]
pub struct CodecContext {
    binary: [Arc<BinaryCodec>; 2],
    xml: [Arc<XmlCodec>; 2],
    json: [Arc<JsonCodec>; 2],
}

impl Default for CodecContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecContext {
    pub fn new() -> Self {
        Self {
            binary: [Arc::new(BinaryCodec::new(false)), Arc::new(BinaryCodec::new(true))],
            xml: [Arc::new(XmlCodec::new(false)), Arc::new(XmlCodec::new(true))],
            json: [Arc::new(JsonCodec::new(false)), Arc::new(JsonCodec::new(true))],
        }
    }

    pub fn decoder_for<E>(&self, format: ContentFormat, compressed: bool) -> Arc<dyn EventDecoder<E>>
    where
        E: CanonicalEvent,
        BinaryCodec: EventDecoder<E>,
        XmlCodec: EventDecoder<E>,
    {
        let idx = usize::from(compressed);
        match format {
            ContentFormat::Protobuf => self.binary[idx].clone(),
            ContentFormat::Xml => self.xml[idx].clone(),
            ContentFormat::Json => self.json[idx].clone(),
        }
    }

    pub fn encoder_for<E>(&self, format: ContentFormat, compressed: bool) -> Arc<dyn EventEncoder<E>>
    where
        E: CanonicalEvent,
        BinaryCodec: EventEncoder<E>,
        XmlCodec: EventEncoder<E>,
    {
        let idx = usize::from(compressed);
        match format {
            ContentFormat::Protobuf => self.binary[idx].clone(),
            ContentFormat::Xml => self.xml[idx].clone(),
            ContentFormat::Json => self.json[idx].clone(),
        }
    }

    /// Decoder matching a file header, checking it holds `E` events
    pub fn decoder_for_header<E>(
        &self,
        header: &FileHeader,
    ) -> Result<Arc<dyn EventDecoder<E>>, DecodeError>
    where
        E: CanonicalEvent,
        BinaryCodec: EventDecoder<E>,
        XmlCodec: EventDecoder<E>,
    {
        let content_type = header.content_type()?;
        if content_type != E::CONTENT_TYPE {
            return Err(DecodeError::UnsupportedFormat(format!(
                "file holds {} events, expected {}",
                content_type,
                E::CONTENT_TYPE
            )));
        }
        Ok(self.decoder_for(header.content_format()?, header.compressed()))
    }
}
