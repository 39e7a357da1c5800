//! Header of persisted buffer files
//!
//! ```text
//! [u32 BE file magic][u32 BE application magic]
//! [i32 BE length L][L bytes metadata map]          (binary string map)
//! [i32 BE length][record] ...                      (records, same framing)
//! ```
//!
//! The metadata map says how the records are encoded, so a reader can pick
//! its decoder without being told.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use sluice_core::{DecodeError, FramingError, SluiceResult};

use crate::binary::StringMapProto;
use crate::framing::{read_frame, write_frame};

/// Magic value opening every persisted buffer file
pub const FILE_MAGIC: u32 = 0x0B50_1E7E;

/// Application magic written by sluice
pub const DEFAULT_APPLICATION_MAGIC: u32 = 0x534C_4943;

pub const CONTENT_TYPE_KEY: &str = "contentType";
pub const CONTENT_FORMAT_KEY: &str = "contentFormat";
pub const COMPRESSION_KEY: &str = "compression";

const GZIP: &str = "gzip";
const NONE: &str = "none";

/// Which canonical event type a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Logging,
    Access,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Logging => "logging",
            ContentType::Access => "access",
        }
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logging" => Ok(ContentType::Logging),
            "access" => Ok(ContentType::Access),
            other => Err(DecodeError::UnsupportedFormat(format!(
                "content type {:?}",
                other
            ))),
        }
    }
}

/// Payload encoding of the records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Protobuf,
    Xml,
    Json,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Protobuf => "protobuf",
            ContentFormat::Xml => "xml",
            ContentFormat::Json => "json",
        }
    }
}

impl Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentFormat {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "protobuf" => Ok(ContentFormat::Protobuf),
            "xml" => Ok(ContentFormat::Xml),
            "json" => Ok(ContentFormat::Json),
            other => Err(DecodeError::UnsupportedFormat(format!(
                "content format {:?}",
                other
            ))),
        }
    }
}

/// Parsed file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub application_magic: u32,
    pub metadata: BTreeMap<String, String>,
}

impl FileHeader {
    /// Header describing records of the given type and encoding
    pub fn new(content_type: ContentType, format: ContentFormat, compressed: bool) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(CONTENT_TYPE_KEY.to_string(), content_type.to_string());
        metadata.insert(CONTENT_FORMAT_KEY.to_string(), format.to_string());
        metadata.insert(
            COMPRESSION_KEY.to_string(),
            if compressed { GZIP } else { NONE }.to_string(),
        );
        Self {
            application_magic: DEFAULT_APPLICATION_MAGIC,
            metadata,
        }
    }

    pub fn with_application_magic(mut self, magic: u32) -> Self {
        self.application_magic = magic;
        self
    }

    pub fn content_type(&self) -> Result<ContentType, DecodeError> {
        self.required(CONTENT_TYPE_KEY)?.parse()
    }

    pub fn content_format(&self) -> Result<ContentFormat, DecodeError> {
        self.required(CONTENT_FORMAT_KEY)?.parse()
    }

    /// Whether records are gzip-compressed; a missing key means no
    pub fn compressed(&self) -> bool {
        self.metadata.get(COMPRESSION_KEY).map(String::as_str) == Some(GZIP)
    }

    fn required(&self, key: &str) -> Result<&str, DecodeError> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| DecodeError::malformed(format!("header metadata lacks {}", key)))
    }

    fn metadata_bytes(&self) -> Vec<u8> {
        StringMapProto {
            entries: self.metadata.clone(),
        }
        .encode_to_vec()
    }

    /// Serialized header, ready to be written at offset 0
    pub fn to_bytes(&self) -> Bytes {
        let metadata = self.metadata_bytes();
        let mut buf = BytesMut::with_capacity(12 + metadata.len());
        buf.put_u32(FILE_MAGIC);
        buf.put_u32(self.application_magic);
        buf.put_i32(metadata.len() as i32);
        buf.extend_from_slice(&metadata);
        buf.freeze()
    }

    /// Write the header and flush
    pub async fn write<W>(&self, writer: &mut W) -> Result<(), FramingError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_u32(FILE_MAGIC).await?;
        writer.write_u32(self.application_magic).await?;
        write_frame(writer, Some(&self.metadata_bytes())).await
    }

    /// Read and validate a header from the start of a stream
    pub async fn read<R>(reader: &mut R) -> SluiceResult<Self>
    where
        R: AsyncRead + Unpin,
    {
        let magic = reader.read_u32().await.map_err(FramingError::from)?;
        if magic != FILE_MAGIC {
            return Err(DecodeError::malformed(format!("bad file magic {:#010x}", magic)).into());
        }
        let application_magic = reader.read_u32().await.map_err(FramingError::from)?;

        let metadata = read_frame(reader)
            .await?
            .ok_or(FramingError::UnexpectedEof)?;
        let map = StringMapProto::decode(metadata)
            .map_err(|e| DecodeError::malformed(format!("header metadata: {}", e)))?;

        Ok(Self {
            application_magic,
            metadata: map.entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sluice_core::SluiceError;

    #[test]
    fn test_header_accessors() {
        let header = FileHeader::new(ContentType::Access, ContentFormat::Json, true);
        assert_eq!(header.content_type().unwrap(), ContentType::Access);
        assert_eq!(header.content_format().unwrap(), ContentFormat::Json);
        assert!(header.compressed());
    }

    #[test]
    fn test_header_layout() {
        let bytes = FileHeader::new(ContentType::Logging, ContentFormat::Xml, false).to_bytes();
        assert_eq!(&bytes[..4], &FILE_MAGIC.to_be_bytes());
        assert_eq!(&bytes[4..8], &DEFAULT_APPLICATION_MAGIC.to_be_bytes());
        let len = i32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        assert_eq!(bytes.len(), 12 + len);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let header = FileHeader::new(ContentType::Logging, ContentFormat::Protobuf, false)
            .with_application_magic(0xCAFE_BABE);
        let mut wire = Vec::new();
        header.write(&mut wire).await.unwrap();
        assert_eq!(wire, header.to_bytes().to_vec());

        let mut reader = &wire[..];
        let read = FileHeader::read(&mut reader).await.unwrap();
        assert_eq!(read, header);
    }

    #[tokio::test]
    async fn test_bad_magic() {
        let mut wire = FileHeader::new(ContentType::Logging, ContentFormat::Json, false)
            .to_bytes()
            .to_vec();
        wire[0] = 0xFF;
        let mut reader = &wire[..];
        let err = FileHeader::read(&mut reader).await.unwrap_err();
        assert!(matches!(err, SluiceError::Decode(DecodeError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_short_header() {
        let mut reader = &[0x0B, 0x50][..];
        let err = FileHeader::read(&mut reader).await.unwrap_err();
        assert!(matches!(err, SluiceError::Framing(FramingError::UnexpectedEof)));
    }

    #[test]
    fn test_unknown_format() {
        let mut header = FileHeader::new(ContentType::Logging, ContentFormat::Json, false);
        header
            .metadata
            .insert(CONTENT_FORMAT_KEY.to_string(), "avro".to_string());
        assert!(matches!(
            header.content_format(),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }
}
