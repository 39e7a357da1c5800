//! Gzip layer shared by all event codecs

use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use sluice_core::{DecodeError, EncodeError};

/// First two bytes of every gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether the data starts with the gzip magic
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Gzip-compress a payload
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(data)
        .map_err(|e| EncodeError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| EncodeError::Compression(e.to_string()))
}

/// Decompress a gzip payload
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::Compression(e.to_string()))?;
    Ok(out)
}

/// Unwrap gzip when present, pass anything else through untouched
pub fn maybe_gunzip(data: &[u8]) -> Result<Cow<'_, [u8]>, DecodeError> {
    if is_gzip(data) {
        gunzip(data).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let data = b"<event logger=\"a\"/>".repeat(20);
        let compressed = gzip(&data).unwrap();
        assert!(is_gzip(&compressed));
        assert!(compressed.len() < data.len());
        assert_eq!(gunzip(&compressed).unwrap(), data);
    }

    #[test]
    fn test_maybe_gunzip_passthrough() {
        let plain = b"{\"logger\":\"a\"}";
        assert!(matches!(maybe_gunzip(plain).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_corrupt_gzip_is_decode_error() {
        let mut compressed = gzip(b"some payload").unwrap();
        compressed.truncate(compressed.len() / 2);
        assert!(matches!(gunzip(&compressed), Err(DecodeError::Compression(_))));
    }
}
