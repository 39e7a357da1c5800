//! Encoder strategies for the sending side
//!
//! A [`StreamEncoder`] turns events into ready-to-write wire bytes. Strategies
//! are composed at construction (codec, framing, optional file header) rather
//! than layered by inheritance.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

use sluice_core::{FramingError, SluiceResult};

use crate::codec::EventEncoder;
use crate::framing::{FrameCodec, Framing};
use crate::header::FileHeader;

/// Encodes a sequence of events into wire bytes
pub trait StreamEncoder<E>: Send {
    /// Bytes for one event, including anything that must precede it
    fn encode(&mut self, event: &E) -> SluiceResult<Bytes>;

    /// Start over as if nothing had been written yet
    fn reset(&mut self);
}

/// Event codec + framing, with an optional file header in front
pub struct FramedEncoder<E> {
    encoder: Arc<dyn EventEncoder<E>>,
    frames: FrameCodec,
    header: Option<FileHeader>,
    header_pending: bool,
}

impl<E> FramedEncoder<E> {
    pub fn new(encoder: Arc<dyn EventEncoder<E>>, framing: Framing) -> Self {
        Self {
            encoder,
            frames: framing.into(),
            header: None,
            header_pending: false,
        }
    }

    /// Emit `header` before the first record
    pub fn with_header(mut self, header: FileHeader) -> Self {
        self.header = Some(header);
        self.header_pending = true;
        self
    }

    pub fn framing(&self) -> Framing {
        self.frames.framing()
    }

    /// Encode one event and write it out, flushing afterwards
    pub async fn write_to<W>(&mut self, writer: &mut W, event: &E) -> SluiceResult<()>
    where
        W: AsyncWrite + Unpin,
        Self: StreamEncoder<E>,
    {
        let bytes = self.encode(event)?;
        writer.write_all(&bytes).await.map_err(FramingError::from)?;
        writer.flush().await.map_err(FramingError::from)?;
        Ok(())
    }
}

impl<E> StreamEncoder<E> for FramedEncoder<E>
where
    E: Send,
{
    fn encode(&mut self, event: &E) -> SluiceResult<Bytes> {
        let payload = self.encoder.encode(event)?;

        let mut out = BytesMut::new();
        if self.header_pending {
            if let Some(header) = &self.header {
                out.extend_from_slice(&header.to_bytes());
            }
            self.header_pending = false;
        }
        self.frames.encode(Some(payload.as_slice()), &mut out)?;
        Ok(out.freeze())
    }

    fn reset(&mut self) {
        self.header_pending = self.header.is_some();
    }
}
