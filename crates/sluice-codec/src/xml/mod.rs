//! XML codec
//!
//! One UTF-8 document per event. String content that may carry arbitrary
//! whitespace (messages, map values, URIs) is written as element text;
//! identifiers and numbers are attributes.

mod access;
mod logging;
mod node;

use sluice_core::{AccessEvent, DecodeError, EncodeError, LoggingEvent};

use crate::codec::{EventDecoder, EventEncoder, finish_encode};
use crate::compression;

pub use node::MAX_NESTING;

/// Streaming XML codec for both canonical event types
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec {
    compressed: bool,
}

impl XmlCodec {
    pub fn new(compressed: bool) -> Self {
        Self { compressed }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

fn parse(bytes: &[u8]) -> Result<node::Node, DecodeError> {
    let bytes = compression::maybe_gunzip(bytes)?;
    node::parse_document(&bytes)
}

impl EventEncoder<LoggingEvent> for XmlCodec {
    fn encode(&self, event: &LoggingEvent) -> Result<Vec<u8>, EncodeError> {
        let mut writer = node::XmlWriter::new();
        logging::write_event(&mut writer, event)?;
        finish_encode(writer.into_inner(), self.compressed)
    }
}

impl EventDecoder<LoggingEvent> for XmlCodec {
    fn decode(&self, bytes: &[u8]) -> Result<LoggingEvent, DecodeError> {
        logging::read_event(&parse(bytes)?)
    }
}

impl EventEncoder<AccessEvent> for XmlCodec {
    fn encode(&self, event: &AccessEvent) -> Result<Vec<u8>, EncodeError> {
        let mut writer = node::XmlWriter::new();
        access::write_event(&mut writer, event)?;
        finish_encode(writer.into_inner(), self.compressed)
    }
}

impl EventDecoder<AccessEvent> for XmlCodec {
    fn decode(&self, bytes: &[u8]) -> Result<AccessEvent, DecodeError> {
        access::read_event(&parse(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sluice_core::Level;

    #[test]
    fn test_minimal_document() {
        let xml = br#"<LoggingEvent logger="a.b" level="ERROR" timestamp="5"><message><pattern>hi</pattern></message></LoggingEvent>"#;
        let event: LoggingEvent = XmlCodec::default().decode(xml).unwrap();
        assert_eq!(event.logger.as_deref(), Some("a.b"));
        assert_eq!(event.level, Some(Level::Error));
        assert_eq!(event.timestamp, Some(5));
        assert_eq!(event.formatted_message().as_deref(), Some("hi"));
        assert!(event.mdc.is_none());
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let result: Result<LoggingEvent, _> = XmlCodec::default().decode(b"<AccessEvent/>");
        assert!(matches!(result, Err(DecodeError::Xml(_))));
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let result: Result<AccessEvent, _> =
            XmlCodec::default().decode(br#"<AccessEvent statusCode="abc"/>"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_string_vs_missing() {
        let event = LoggingEvent {
            logger: Some(String::new()),
            message: Some(sluice_core::Message::new("")),
            ..Default::default()
        };
        let codec = XmlCodec::default();
        let bytes = codec.encode(&event).unwrap();
        let decoded: LoggingEvent = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, event);
    }
}
