//! Ingestion from persisted buffer files
//!
//! The file header says which codec its records use, so a file source needs
//! no format configuration: it reads the header, picks the decoder from the
//! [`CodecContext`] and feeds the rest of the file to a regular
//! [`StreamEventProducer`].

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::BufReader;
use tracing::{info, instrument};

use sluice_codec::{BinaryCodec, CanonicalEvent, CodecContext, EventDecoder, FileHeader, XmlCodec};
use sluice_core::{AppendOperation, EventWrapper, SourceIdentifier};
use sluice_storage::StorageError;

use crate::error::IngestResult;
use crate::producer::{ProducerState, ProducerStatsSnapshot, StreamEventProducer};

/// A producer over the records of one buffer file
pub struct FileSource<E> {
    header: FileHeader,
    producer: StreamEventProducer<E>,
}

impl<E> FileSource<E>
where
    E: CanonicalEvent,
    BinaryCodec: EventDecoder<E>,
    XmlCodec: EventDecoder<E>,
{
    /// Open `path` and validate its header against `E`
    ///
    /// The source is named after the file name, with the full path as its
    /// secondary part.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(
        path: impl AsRef<Path>,
        codecs: &CodecContext,
        buffer: Arc<dyn AppendOperation<EventWrapper<E>>>,
    ) -> IngestResult<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path).await?);

        let header = FileHeader::read(&mut reader)
            .await
            .map_err(|e| StorageError::invalid_header(e.to_string()))?;
        let decoder = codecs
            .decoder_for_header::<E>(&header)
            .map_err(|e| StorageError::invalid_header(e.to_string()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let source = SourceIdentifier::with_secondary(name, path.display().to_string());

        info!(
            source = %source,
            content_type = %E::CONTENT_TYPE,
            compressed = header.compressed(),
            "Opened file source"
        );
        Ok(Self {
            header,
            producer: StreamEventProducer::new(source, reader, decoder, buffer),
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn source(&self) -> &SourceIdentifier {
        self.producer.source()
    }

    pub fn start(&self) -> IngestResult<()> {
        self.producer.start()
    }

    pub fn close(&self) {
        self.producer.close()
    }

    /// Wait until every record was replayed
    pub async fn join(&self) -> IngestResult<()> {
        self.producer.join().await
    }

    pub fn state(&self) -> ProducerState {
        self.producer.state()
    }

    pub fn stats(&self) -> ProducerStatsSnapshot {
        self.producer.stats()
    }
}
