//! Stream framing
//!
//! Two framings split a byte stream into payloads:
//!
//! ```text
//! length-prefixed:  [i32 big-endian length L][L bytes payload]   (L == 0: empty message)
//! zero-delimited:   [payload bytes ...][0x00]
//! ```
//!
//! Zero-delimited framing cannot carry NUL bytes inside a payload. Encoding
//! such a payload fails with [`FramingError::EmbeddedNul`] rather than
//! silently splitting it on the wire.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use sluice_core::FramingError;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload a length prefix can describe
pub const MAX_FRAME_LENGTH: usize = i32::MAX as usize;

/// Upper bound on speculative buffer growth while waiting for a frame
const RESERVE_CHUNK: usize = 64 * 1024;

const DELIMITER: u8 = 0x00;

/// Framing used on a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    #[default]
    LengthPrefixed,
    ZeroDelimited,
}

impl Framing {
    /// Build a codec for this framing with the given payload limit
    pub fn codec(self, max_frame_length: usize) -> FrameCodec {
        match self {
            Framing::LengthPrefixed => {
                FrameCodec::LengthPrefixed(LengthPrefixedCodec::with_max_frame_length(max_frame_length))
            }
            Framing::ZeroDelimited => {
                FrameCodec::ZeroDelimited(ZeroDelimitedCodec::with_max_frame_length(max_frame_length))
            }
        }
    }
}

/// Length-prefixed frame codec
#[derive(Debug, Clone)]
pub struct LengthPrefixedCodec {
    max_frame_length: usize,
}

impl Default for LengthPrefixedCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LengthPrefixedCodec {
    pub fn new() -> Self {
        Self {
            max_frame_length: MAX_FRAME_LENGTH,
        }
    }

    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: max_frame_length.min(MAX_FRAME_LENGTH),
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Decoder for LengthPrefixedCodec {
    type Item = BytesMut;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let length = (&src[..LENGTH_PREFIX_LEN]).get_i32();
        if length < 0 {
            return Err(FramingError::InvalidLength(length));
        }

        let length = length as usize;
        if length > self.max_frame_length {
            return Err(FramingError::FrameTooLarge {
                size: length,
                max: self.max_frame_length,
            });
        }

        let total = LENGTH_PREFIX_LEN + length;
        if src.len() < total {
            src.reserve((total - src.len()).min(RESERVE_CHUNK));
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        Ok(Some(src.split_to(length)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        if src.len() < LENGTH_PREFIX_LEN {
            // A partial length prefix is a clean end of stream.
            if !src.is_empty() {
                debug!(bytes = src.len(), "Discarding partial length prefix at end of stream");
                src.clear();
            }
            return Ok(None);
        }

        let expected = (&src[..LENGTH_PREFIX_LEN]).get_i32() as usize;
        Err(FramingError::TruncatedStream {
            expected,
            available: src.len() - LENGTH_PREFIX_LEN,
        })
    }
}

impl<'a> Encoder<Option<&'a [u8]>> for LengthPrefixedCodec {
    type Error = FramingError;

    fn encode(&mut self, item: Option<&'a [u8]>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.unwrap_or_default();
        if payload.len() > self.max_frame_length {
            return Err(FramingError::FrameTooLarge {
                size: payload.len(),
                max: self.max_frame_length,
            });
        }

        dst.reserve(LENGTH_PREFIX_LEN + payload.len());
        dst.put_i32(payload.len() as i32);
        dst.extend_from_slice(payload);
        Ok(())
    }
}

/// Zero-byte-delimited frame codec
#[derive(Debug, Clone)]
pub struct ZeroDelimitedCodec {
    max_frame_length: usize,
    /// Bytes of the pending frame already scanned for the delimiter
    scanned: usize,
}

impl Default for ZeroDelimitedCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ZeroDelimitedCodec {
    pub fn new() -> Self {
        Self::with_max_frame_length(MAX_FRAME_LENGTH)
    }

    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            scanned: 0,
        }
    }
}

impl Decoder for ZeroDelimitedCodec {
    type Item = BytesMut;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let offset = src[self.scanned..].iter().position(|b| *b == DELIMITER);

        match offset {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;
                let frame = src.split_to(end);
                src.advance(1);
                Ok(Some(frame))
            }
            None => {
                if src.len() > self.max_frame_length {
                    return Err(FramingError::FrameTooLarge {
                        size: src.len(),
                        max: self.max_frame_length,
                    });
                }
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            debug!(bytes = src.len(), "Discarding unterminated frame at end of stream");
            src.clear();
            self.scanned = 0;
        }
        Ok(None)
    }
}

impl<'a> Encoder<Option<&'a [u8]>> for ZeroDelimitedCodec {
    type Error = FramingError;

    fn encode(&mut self, item: Option<&'a [u8]>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.unwrap_or_default();
        if payload.contains(&DELIMITER) {
            return Err(FramingError::EmbeddedNul);
        }
        dst.reserve(payload.len() + 1);
        dst.extend_from_slice(payload);
        dst.put_u8(DELIMITER);
        Ok(())
    }
}

/// Either framing behind one codec type
#[derive(Debug, Clone)]
pub enum FrameCodec {
    LengthPrefixed(LengthPrefixedCodec),
    ZeroDelimited(ZeroDelimitedCodec),
}

impl FrameCodec {
    pub fn framing(&self) -> Framing {
        match self {
            FrameCodec::LengthPrefixed(_) => Framing::LengthPrefixed,
            FrameCodec::ZeroDelimited(_) => Framing::ZeroDelimited,
        }
    }
}

impl From<Framing> for FrameCodec {
    fn from(framing: Framing) -> Self {
        framing.codec(MAX_FRAME_LENGTH)
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            FrameCodec::LengthPrefixed(codec) => codec.decode(src),
            FrameCodec::ZeroDelimited(codec) => codec.decode(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            FrameCodec::LengthPrefixed(codec) => codec.decode_eof(src),
            FrameCodec::ZeroDelimited(codec) => codec.decode_eof(src),
        }
    }
}

impl<'a> Encoder<Option<&'a [u8]>> for FrameCodec {
    type Error = FramingError;

    fn encode(&mut self, item: Option<&'a [u8]>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self {
            FrameCodec::LengthPrefixed(codec) => codec.encode(item, dst),
            FrameCodec::ZeroDelimited(codec) => codec.encode(item, dst),
        }
    }
}

/// Read one length-prefixed frame
///
/// Returns `Ok(None)` when the stream closes before a full length prefix was
/// read. A length of zero yields an empty payload.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return Ok(None);
        }
        filled += n;
    }

    let length = i32::from_be_bytes(prefix);
    if length < 0 {
        return Err(FramingError::InvalidLength(length));
    }
    let length = length as usize;

    // Grows with the data actually received, not with the announced length.
    let mut payload = Vec::new();
    let read = (&mut *reader)
        .take(length as u64)
        .read_to_end(&mut payload)
        .await?;
    if read < length {
        return Err(FramingError::TruncatedStream {
            expected: length,
            available: read,
        });
    }

    Ok(Some(Bytes::from(payload)))
}

/// Write one length-prefixed frame and flush
///
/// `None` writes the four-zero-byte null message.
pub async fn write_frame<W>(writer: &mut W, payload: Option<&[u8]>) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = BytesMut::new();
    LengthPrefixedCodec::new().encode(payload, &mut frame)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_with<C>(codec: &mut C, payload: Option<&[u8]>) -> BytesMut
    where
        C: for<'a> Encoder<Option<&'a [u8]>, Error = FramingError>,
    {
        let mut dst = BytesMut::new();
        codec.encode(payload, &mut dst).unwrap();
        dst
    }

    #[test]
    fn test_hello_wire_bytes() {
        let mut codec = LengthPrefixedCodec::new();
        let wire = encode_with(&mut codec, Some(b"hello"));
        assert_eq!(
            &wire[..],
            &[0x00, 0x00, 0x00, 0x05, 0x68, 0x65, 0x6C, 0x6C, 0x6F]
        );
    }

    #[test]
    fn test_null_message_wire_bytes() {
        let mut codec = LengthPrefixedCodec::new();
        let wire = encode_with(&mut codec, None);
        assert_eq!(&wire[..], &[0x00, 0x00, 0x00, 0x00]);

        let mut src = wire;
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = LengthPrefixedCodec::new();
        let mut src = BytesMut::from(&[0x00, 0x00, 0x00, 0x03, b'a'][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(b"bc");
        assert_eq!(&codec.decode(&mut src).unwrap().unwrap()[..], b"abc");
        assert!(src.is_empty());
    }

    #[test]
    fn test_negative_length_error() {
        let mut codec = LengthPrefixedCodec::new();
        let mut src = BytesMut::from(&(-1i32).to_be_bytes()[..]);
        assert_eq!(
            codec.decode(&mut src).unwrap_err(),
            FramingError::InvalidLength(-1)
        );
    }

    #[test]
    fn test_frame_too_large_error() {
        let mut codec = LengthPrefixedCodec::with_max_frame_length(4);
        let mut src = BytesMut::from(&10i32.to_be_bytes()[..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(FramingError::FrameTooLarge { size: 10, max: 4 })
        ));
    }

    #[test]
    fn test_partial_prefix_at_eof_is_end_of_stream() {
        let mut codec = LengthPrefixedCodec::new();
        let mut src = BytesMut::from(&[0x00, 0x00][..]);
        assert!(codec.decode_eof(&mut src).unwrap().is_none());

        let mut empty = BytesMut::new();
        assert!(codec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn test_truncated_payload_at_eof() {
        let mut codec = LengthPrefixedCodec::new();
        let mut src = BytesMut::from(&[0x00, 0x00, 0x00, 0x05, b'h', b'e'][..]);
        assert_eq!(
            codec.decode_eof(&mut src).unwrap_err(),
            FramingError::TruncatedStream {
                expected: 5,
                available: 2
            }
        );
    }

    #[test]
    fn test_zero_delimited_roundtrip() {
        let mut codec = ZeroDelimitedCodec::new();
        let mut wire = encode_with(&mut codec, Some(b"<event/>"));
        wire.extend_from_slice(&encode_with(&mut codec, None));
        assert_eq!(&wire[..], b"<event/>\0\0");

        assert_eq!(&codec.decode(&mut wire).unwrap().unwrap()[..], b"<event/>");
        assert!(codec.decode(&mut wire).unwrap().unwrap().is_empty());
        assert!(codec.decode(&mut wire).unwrap().is_none());
    }

    #[test]
    fn test_zero_delimited_split_reads() {
        let mut codec = ZeroDelimitedCodec::new();
        let mut src = BytesMut::from(&b"abc"[..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(b"def\0gh");
        assert_eq!(&codec.decode(&mut src).unwrap().unwrap()[..], b"abcdef");
        assert_eq!(&src[..], b"gh");
        assert!(codec.decode_eof(&mut src).unwrap().is_none());
        assert!(src.is_empty());
    }

    #[test]
    fn test_zero_delimited_rejects_embedded_nul() {
        let mut codec = ZeroDelimitedCodec::new();
        let mut dst = BytesMut::new();
        assert_eq!(
            codec.encode(Some(&b"a\0b"[..]), &mut dst).unwrap_err(),
            FramingError::EmbeddedNul
        );
    }

    #[tokio::test]
    async fn test_read_write_frame() {
        let mut wire = Vec::new();
        write_frame(&mut wire, Some(b"hello")).await.unwrap();
        write_frame(&mut wire, None).await.unwrap();

        let mut reader = &wire[..];
        assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), Bytes::from_static(b"hello"));
        assert!(read_frame(&mut reader).await.unwrap().unwrap().is_empty());
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_frame_truncated() {
        let wire = [0x00, 0x00, 0x00, 0x08, b'x', b'y'];
        let mut reader = &wire[..];
        assert_eq!(
            read_frame(&mut reader).await.unwrap_err(),
            FramingError::TruncatedStream {
                expected: 8,
                available: 2
            }
        );
    }
}
