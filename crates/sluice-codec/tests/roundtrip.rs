//! Codec round-trip tests
//!
//! Every canonical event must come back field-for-field through every codec
//! and compression setting, including the difference between an empty
//! collection and a missing one.

use std::collections::BTreeMap;

use futures::StreamExt;
use tokio_util::codec::FramedRead;

use sluice_codec::{
    BinaryCodec, EventDecoder, EventEncoder, FrameCodec, Framing, JsonCodec, LengthPrefixedCodec,
    XmlCodec,
};
use sluice_core::{
    AccessEvent, FramingError, Level, LoggerContext, LoggingEvent, Message, StackFrame,
    ThreadInfo, ThrowableInfo,
};

// ============================================================================
// Fixtures
// ============================================================================

fn frame(class: &str, method: &str, line: i32) -> StackFrame {
    StackFrame::new(class, method, format!("{}.java", class.rsplit('.').next().unwrap()), line)
}

fn rich_logging_event() -> LoggingEvent {
    let mut mdc = BTreeMap::new();
    mdc.insert("requestId".to_string(), "r-42".to_string());
    mdc.insert("user".to_string(), "  spaced value  ".to_string());
    mdc.insert("empty".to_string(), String::new());

    let mut properties = BTreeMap::new();
    properties.insert("HOSTNAME".to_string(), "box-1".to_string());

    let root_cause = ThrowableInfo {
        stack_trace: Some(vec![StackFrame {
            line_number: Some(sluice_core::NATIVE_METHOD_LINE),
            ..frame("java.net.Socket", "connect0", 0)
        }]),
        ..ThrowableInfo::new("java.net.ConnectException", Some("refused".into()))
    };
    let suppressed = ThrowableInfo {
        stack_trace: Some(Vec::new()),
        ..ThrowableInfo::new("java.lang.IllegalStateException", None)
    };
    let throwable = ThrowableInfo {
        stack_trace: Some(vec![
            frame("com.example.Client", "call", 88),
            StackFrame {
                code_location: Some("client-1.2.jar".into()),
                version: Some("1.2".into()),
                exact: true,
                ..frame("com.example.Main", "main", 12)
            },
        ]),
        omitted_elements: 3,
        cause: Some(Box::new(root_cause)),
        suppressed: Some(vec![suppressed]),
        ..ThrowableInfo::new("java.io.IOException", Some("multi\nline <message> & more".into()))
    };

    LoggingEvent {
        logger: Some("com.example.Client".into()),
        level: Some(Level::Error),
        timestamp: Some(1_700_000_000_000),
        sequence_number: Some(17),
        message: Some(Message::with_arguments(
            "call to {} failed after {} tries",
            vec![Some("backend".into()), None, Some(String::new())],
        )),
        thread_info: Some(ThreadInfo {
            name: Some("worker-3".into()),
            id: Some(33),
            group_name: Some("main".into()),
            group_id: Some(1),
            priority: Some(5),
        }),
        mdc: Some(mdc),
        ndc: Some(vec![Message::new("outer"), Message::new("inner")]),
        call_stack: Some(vec![frame("com.example.Client", "call", 88)]),
        throwable: Some(throwable),
        logger_context: Some(LoggerContext {
            name: Some("default".into()),
            birth_time: Some(1_699_999_000_000),
            properties: Some(properties),
        }),
    }
}

fn sparse_logging_event() -> LoggingEvent {
    LoggingEvent {
        logger: Some("sparse".into()),
        mdc: Some(BTreeMap::new()),
        ndc: Some(Vec::new()),
        call_stack: None,
        message: Some(Message {
            pattern: None,
            arguments: Some(Vec::new()),
        }),
        ..Default::default()
    }
}

fn rich_access_event() -> AccessEvent {
    let mut request_headers = BTreeMap::new();
    request_headers.insert("Accept".to_string(), "text/html".to_string());
    let mut params = BTreeMap::new();
    params.insert("tag".to_string(), vec!["a".to_string(), "b".to_string()]);
    params.insert("flag".to_string(), Vec::new());

    AccessEvent {
        timestamp: Some(1_700_000_000_500),
        elapsed_time: Some(12),
        method: Some("POST".into()),
        protocol: Some("HTTP/1.1".into()),
        remote_address: Some("10.0.0.7".into()),
        remote_host: Some("client.local".into()),
        remote_user: None,
        request_uri: Some("/search".into()),
        request_url: Some("POST /search?tag=a&tag=b HTTP/1.1".into()),
        server_name: Some("api".into()),
        local_port: Some(8080),
        status_code: Some(201),
        request_headers: Some(request_headers),
        response_headers: Some(BTreeMap::new()),
        request_parameters: Some(params),
        logger_context: Some(LoggerContext {
            name: Some("access".into()),
            ..Default::default()
        }),
    }
}

fn assert_roundtrip<C, E>(codec: &C, event: &E)
where
    C: EventEncoder<E> + EventDecoder<E>,
    E: PartialEq + std::fmt::Debug,
{
    let bytes = codec.encode(event).expect("encode");
    let decoded = codec.decode(&bytes).expect("decode");
    assert_eq!(&decoded, event);
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_logging_event_roundtrip_all_codecs() {
    for event in [rich_logging_event(), sparse_logging_event(), LoggingEvent::default()] {
        for compressed in [false, true] {
            assert_roundtrip(&BinaryCodec::new(compressed), &event);
            assert_roundtrip(&XmlCodec::new(compressed), &event);
            assert_roundtrip(&JsonCodec::new(compressed), &event);
        }
    }
}

#[test]
fn test_access_event_roundtrip_all_codecs() {
    for event in [rich_access_event(), AccessEvent::default()] {
        for compressed in [false, true] {
            assert_roundtrip(&BinaryCodec::new(compressed), &event);
            assert_roundtrip(&XmlCodec::new(compressed), &event);
            assert_roundtrip(&JsonCodec::new(compressed), &event);
        }
    }
}

#[test]
fn test_omitted_elements_survive_every_codec() {
    let event = rich_logging_event();
    let codecs: Vec<Box<dyn EventDecoderEncoder>> = vec![
        Box::new(BinaryCodec::new(true)),
        Box::new(XmlCodec::new(false)),
        Box::new(JsonCodec::new(true)),
    ];
    for codec in codecs {
        let decoded = codec.roundtrip(&event);
        assert_eq!(decoded.throwable.unwrap().omitted_elements, 3);
    }
}

trait EventDecoderEncoder {
    fn roundtrip(&self, event: &LoggingEvent) -> LoggingEvent;
}

impl<C> EventDecoderEncoder for C
where
    C: EventEncoder<LoggingEvent> + EventDecoder<LoggingEvent>,
{
    fn roundtrip(&self, event: &LoggingEvent) -> LoggingEvent {
        self.decode(&self.encode(event).unwrap()).unwrap()
    }
}

// ============================================================================
// XML and JSON agreement
// ============================================================================

#[test]
fn test_xml_and_json_decode_to_same_event() {
    let event = rich_logging_event();
    let xml = XmlCodec::default();
    let json = JsonCodec::default();

    let from_xml: LoggingEvent = xml.decode(&xml.encode(&event).unwrap()).unwrap();
    let from_json: LoggingEvent = json.decode(&json.encode(&event).unwrap()).unwrap();
    assert_eq!(from_xml, from_json);

    let access = rich_access_event();
    let from_xml: AccessEvent = xml.decode(&xml.encode(&access).unwrap()).unwrap();
    let from_json: AccessEvent = json.decode(&json.encode(&access).unwrap()).unwrap();
    assert_eq!(from_xml, from_json);
}

#[test]
fn test_decode_then_encode_is_stable() {
    let event = rich_logging_event();
    let xml = XmlCodec::default();
    let json = JsonCodec::default();

    let xml_bytes = xml.encode(&event).unwrap();
    let reencoded = xml.encode(&EventDecoder::<LoggingEvent>::decode(&xml, &xml_bytes).unwrap()).unwrap();
    assert_eq!(reencoded, xml_bytes);

    let json_bytes = json.encode(&event).unwrap();
    let reencoded = json.encode(&EventDecoder::<LoggingEvent>::decode(&json, &json_bytes).unwrap()).unwrap();
    assert_eq!(reencoded, json_bytes);
}

// ============================================================================
// Framing over streams
// ============================================================================

#[tokio::test]
async fn test_framed_read_over_chunked_stream() {
    let mut wire = Vec::new();
    for payload in [&b"first"[..], b"", b"third"] {
        wire.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        wire.extend_from_slice(payload);
    }

    // Deliver the stream in awkward chunks.
    let mut builder = tokio_test::io::Builder::new();
    for chunk in wire.chunks(3) {
        builder.read(chunk);
    }
    let mock = builder.build();

    let frames: Vec<_> = FramedRead::new(mock, LengthPrefixedCodec::new())
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(|frame| frame.unwrap().to_vec())
        .collect();
    assert_eq!(frames, vec![b"first".to_vec(), Vec::new(), b"third".to_vec()]);
}

#[tokio::test]
async fn test_framed_read_truncated_stream() {
    let mock = tokio_test::io::Builder::new()
        .read(&[0x00, 0x00, 0x00, 0x0A, b'p', b'a'])
        .build();

    let mut frames = FramedRead::new(mock, FrameCodec::from(Framing::LengthPrefixed));
    let err = frames.next().await.unwrap().unwrap_err();
    assert_eq!(
        err,
        FramingError::TruncatedStream {
            expected: 10,
            available: 2
        }
    );
}

#[tokio::test]
async fn test_framed_read_zero_delimited() {
    let mock = tokio_test::io::Builder::new()
        .read(b"<a/>\0<b")
        .read(b"/>\0")
        .build();

    let frames: Vec<_> = FramedRead::new(mock, FrameCodec::from(Framing::ZeroDelimited))
        .map(|frame| frame.unwrap().to_vec())
        .collect()
        .await;
    assert_eq!(frames, vec![b"<a/>".to_vec(), b"<b/>".to_vec()]);
}
