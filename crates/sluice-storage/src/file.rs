//! Persisted buffer files
//!
//! A file starts with a [`FileHeader`] describing the record encoding,
//! followed by length-prefixed records:
//!
//! ```text
//! [header][i32 BE len][record][i32 BE len][record]...
//! ```
//!
//! Replay stops at the first incomplete record. Reopening a file for append
//! cuts such a tail off before writing again.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use sluice_codec::framing::LENGTH_PREFIX_LEN;
use sluice_codec::header::DEFAULT_APPLICATION_MAGIC;
use sluice_codec::{
    BinaryCodec, CanonicalEvent, CodecContext, ContentFormat, EventCodec, EventDecoder,
    FileHeader, FramedEncoder, Framing, StreamEncoder, XmlCodec, read_frame,
};
use sluice_core::FramingError;

use crate::error::{StorageError, StorageResult};

/// Configuration for a persisted buffer file
#[derive(Debug, Clone)]
pub struct EventFileConfig {
    /// Record encoding
    pub format: ContentFormat,
    /// Whether records are gzip-compressed
    pub compressed: bool,
    /// Whether to sync writes to disk immediately
    pub sync_on_write: bool,
    /// Application magic written into the header
    pub application_magic: u32,
}

impl Default for EventFileConfig {
    fn default() -> Self {
        Self {
            format: ContentFormat::Protobuf,
            compressed: false,
            sync_on_write: true,
            application_magic: DEFAULT_APPLICATION_MAGIC,
        }
    }
}

impl EventFileConfig {
    pub fn with_format(mut self, format: ContentFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_compression(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn with_sync_on_write(mut self, sync_on_write: bool) -> Self {
        self.sync_on_write = sync_on_write;
        self
    }

    fn header<E: CanonicalEvent>(&self) -> FileHeader {
        FileHeader::new(E::CONTENT_TYPE, self.format, self.compressed)
            .with_application_magic(self.application_magic)
    }
}

struct WriterState<E> {
    file: Option<File>,
    encoder: FramedEncoder<E>,
}

/// Append-only writer of a persisted buffer file
pub struct EventFileWriter<E> {
    path: PathBuf,
    config: EventFileConfig,
    state: Mutex<WriterState<E>>,
    records: AtomicU64,
}

impl<E> EventFileWriter<E>
where
    E: CanonicalEvent,
    BinaryCodec: EventCodec<E>,
    XmlCodec: EventCodec<E>,
{
    /// Create (or truncate) a file and write its header
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn create(
        path: impl AsRef<Path>,
        config: EventFileConfig,
        codecs: &CodecContext,
    ) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;

        config.header::<E>().write(&mut file).await?;
        if config.sync_on_write {
            file.sync_data().await?;
        }

        info!(
            format = %config.format,
            compressed = config.compressed,
            "Created event file"
        );
        Ok(Self::with_file(path, config, codecs, file, 0))
    }

    /// Open an existing file for append, creating it if missing
    ///
    /// The header must match `config`. Records are replayed to count them and
    /// an incomplete tail is cut off.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(
        path: impl AsRef<Path>,
        config: EventFileConfig,
        codecs: &CodecContext,
    ) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !tokio::fs::try_exists(&path).await? {
            return Self::create(path, config, codecs).await;
        }

        let mut reader = EventFileReader::<E>::open(&path, codecs).await?;
        let header = reader.header();
        if header.content_format()? != config.format || header.compressed() != config.compressed {
            return Err(StorageError::invalid_header(format!(
                "file holds {} records (gzip: {}), expected {} (gzip: {})",
                header.content_format()?,
                header.compressed(),
                config.format,
                config.compressed
            )));
        }
        while reader.next_event().await?.is_some() {}
        let valid_len = reader.valid_len();
        let records = reader.records();
        drop(reader);

        let mut file = OpenOptions::new().write(true).open(&path).await?;
        let file_len = file.metadata().await?.len();
        if file_len > valid_len {
            warn!(
                discarded = file_len - valid_len,
                offset = valid_len,
                "Cutting off incomplete tail"
            );
            file.set_len(valid_len).await?;
        }
        file.seek(SeekFrom::End(0)).await?;

        debug!(records, offset = valid_len, "Event file opened for append");
        Ok(Self::with_file(path, config, codecs, file, records))
    }

    fn with_file(
        path: PathBuf,
        config: EventFileConfig,
        codecs: &CodecContext,
        file: File,
        records: u64,
    ) -> Self {
        let encoder = FramedEncoder::new(
            codecs.encoder_for::<E>(config.format, config.compressed),
            Framing::LengthPrefixed,
        );
        Self {
            path,
            config,
            state: Mutex::new(WriterState {
                file: Some(file),
                encoder,
            }),
            records: AtomicU64::new(records),
        }
    }

    /// Append one record, returning its index in the file
    pub async fn append(&self, event: &E) -> StorageResult<u64> {
        let mut state = self.state.lock().await;
        let WriterState { file, encoder } = &mut *state;
        let file = file.as_mut().ok_or(StorageError::Closed)?;

        let bytes = encoder.encode(event)?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        if self.config.sync_on_write {
            file.sync_data().await?;
        }

        let index = self.records.fetch_add(1, Ordering::SeqCst);
        debug!(record = index, bytes = bytes.len(), "Appended record");
        Ok(index)
    }

    /// Append records in order, syncing once at the end
    pub async fn append_all(&self, events: &[E]) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let WriterState { file, encoder } = &mut *state;
        let file = file.as_mut().ok_or(StorageError::Closed)?;

        for event in events {
            let bytes = encoder.encode(event)?;
            file.write_all(&bytes).await?;
        }
        file.flush().await?;
        if self.config.sync_on_write {
            file.sync_data().await?;
        }

        self.records.fetch_add(events.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    /// Number of records in the file
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the file; later appends fail with [`StorageError::Closed`]
    pub async fn close(&self) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if let Some(mut file) = state.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}

/// Sequential reader of a persisted buffer file
pub struct EventFileReader<E> {
    header: FileHeader,
    decoder: Arc<dyn EventDecoder<E>>,
    reader: BufReader<File>,
    offset: u64,
    records: u64,
    skipped: u64,
    done: bool,
}

impl<E> EventFileReader<E>
where
    E: CanonicalEvent,
    BinaryCodec: EventCodec<E>,
    XmlCodec: EventCodec<E>,
{
    /// Open a file and validate its header
    pub async fn open(path: impl AsRef<Path>, codecs: &CodecContext) -> StorageResult<Self> {
        let file = File::open(path.as_ref()).await?;
        let mut reader = BufReader::new(file);

        let header = FileHeader::read(&mut reader)
            .await
            .map_err(|e| StorageError::invalid_header(e.to_string()))?;
        let decoder = codecs
            .decoder_for_header::<E>(&header)
            .map_err(|e| StorageError::invalid_header(e.to_string()))?;
        let offset = header.to_bytes().len() as u64;

        Ok(Self {
            header,
            decoder,
            reader,
            offset,
            records: 0,
            skipped: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Next decodable record, or `None` at the end of the valid data
    ///
    /// Records that fail to decode are skipped and counted.
    pub async fn next_event(&mut self) -> StorageResult<Option<E>> {
        while !self.done {
            let payload = match read_frame(&mut self.reader).await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    self.done = true;
                    break;
                }
                Err(
                    e @ (FramingError::TruncatedStream { .. }
                    | FramingError::UnexpectedEof
                    | FramingError::InvalidLength(_)),
                ) => {
                    warn!(offset = self.offset, error = %e, "Truncated record, stopping replay");
                    self.done = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            self.offset += (LENGTH_PREFIX_LEN + payload.len()) as u64;
            self.records += 1;
            if payload.is_empty() {
                continue;
            }
            match self.decoder.decode(&payload) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.skipped += 1;
                    debug!(record = self.records - 1, error = %e, "Skipping undecodable record");
                }
            }
        }
        Ok(None)
    }

    /// Replay every remaining record
    pub async fn read_all(&mut self) -> StorageResult<Vec<E>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await? {
            events.push(event);
        }
        info!(
            records = self.records,
            skipped = self.skipped,
            "Replayed event file"
        );
        Ok(events)
    }

    /// Complete records read so far, decodable or not
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Records skipped because they failed to decode
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Length of the header plus every complete record read so far
    pub fn valid_len(&self) -> u64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use sluice_core::{Level, LoggingEvent};
    use tempfile::TempDir;

    fn event(i: usize) -> LoggingEvent {
        LoggingEvent {
            timestamp: Some(i as i64),
            ..LoggingEvent::new("file", Level::Info, format!("record {}", i))
        }
    }

    #[tokio::test]
    async fn test_write_and_replay() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.sluice");
        let codecs = CodecContext::new();

        let writer = EventFileWriter::<LoggingEvent>::create(&path, EventFileConfig::default(), &codecs)
            .await
            .unwrap();
        for i in 0..5 {
            assert_eq!(writer.append(&event(i)).await.unwrap(), i as u64);
        }
        writer.close().await.unwrap();
        assert!(matches!(
            writer.append(&event(5)).await,
            Err(StorageError::Closed)
        ));

        let mut reader = EventFileReader::<LoggingEvent>::open(&path, &codecs)
            .await
            .unwrap();
        let events = reader.read_all().await.unwrap();
        assert_eq!(events, (0..5).map(event).collect::<Vec<_>>());
        assert_eq!(reader.skipped(), 0);
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/events.sluice");
        let codecs = CodecContext::new();
        let config = EventFileConfig::default()
            .with_format(ContentFormat::Xml)
            .with_compression(true)
            .with_sync_on_write(false);

        {
            let writer = EventFileWriter::<LoggingEvent>::open(&path, config.clone(), &codecs)
                .await
                .unwrap();
            writer.append_all(&[event(0), event(1)]).await.unwrap();
            writer.close().await.unwrap();
        }
        {
            let writer = EventFileWriter::<LoggingEvent>::open(&path, config, &codecs)
                .await
                .unwrap();
            assert_eq!(writer.records(), 2);
            assert_eq!(writer.append(&event(2)).await.unwrap(), 2);
            writer.close().await.unwrap();
        }

        let mut reader = EventFileReader::<LoggingEvent>::open(&path, &codecs)
            .await
            .unwrap();
        assert_eq!(reader.read_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_open_rejects_mismatched_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.sluice");
        let codecs = CodecContext::new();

        let writer = EventFileWriter::<LoggingEvent>::create(&path, EventFileConfig::default(), &codecs)
            .await
            .unwrap();
        writer.close().await.unwrap();

        let json = EventFileConfig::default().with_format(ContentFormat::Json);
        let result = EventFileWriter::<LoggingEvent>::open(&path, json, &codecs).await;
        assert!(matches!(result, Err(StorageError::InvalidHeader(_))));
    }
}
