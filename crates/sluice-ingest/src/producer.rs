//! Stream event producer
//!
//! One producer owns one byte stream. Its worker reads frames, decodes them
//! and appends the events to a buffer, all on the same task, so events reach
//! the buffer in exactly the order their frames were read:
//!
//! ```text
//! stream ──► FramedRead<FrameCodec> ──► EventDecoder ──► EventWrapper { source, 1.. } ──► buffer
//!                                                                       │
//!                                        end of stream / error / cancel ┴──► terminal sentinel
//! ```
//!
//! Undecodable frames are skipped and counted. Framing errors, I/O errors and
//! buffer failures end the producer. However it ends, the worker appends a
//! terminal sentinel as its last action.

use std::fmt::{self, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, trace, warn};

use sluice_codec::{EventDecoder, FrameCodec, Framing};
use sluice_core::{AppendOperation, BufferError, EventIdentifier, EventWrapper, FramingError, SourceIdentifier};

use crate::error::{IngestError, IngestResult};

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// Lifecycle of a producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProducerState {
    Created,
    Running,
    /// The stream ended or the producer was closed
    Closed,
    /// A framing, I/O or buffer error ended the producer
    Failed,
}

impl ProducerState {
    /// Whether the producer has finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProducerState::Closed | ProducerState::Failed)
    }
}

impl Display for ProducerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProducerState::Created => "created",
            ProducerState::Running => "running",
            ProducerState::Closed => "closed",
            ProducerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Live counters of a producer
#[derive(Debug, Default)]
pub struct ProducerStats {
    frames: AtomicU64,
    events: AtomicU64,
    decode_failures: AtomicU64,
    empty_frames: AtomicU64,
}

impl ProducerStats {
    pub fn snapshot(&self) -> ProducerStatsSnapshot {
        ProducerStatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            empty_frames: self.empty_frames.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ProducerStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProducerStatsSnapshot {
    /// Frames read from the stream
    pub frames: u64,
    /// Events appended to the buffer
    pub events: u64,
    /// Frames that failed to decode and were skipped
    pub decode_failures: u64,
    /// Empty (null message) frames, skipped
    pub empty_frames: u64,
}

/// State shared between the producer handle and its worker
#[derive(Debug)]
struct Shared {
    state: RwLock<ProducerState>,
    stats: ProducerStats,
    cancel: CancellationToken,
}

impl Shared {
    fn set_state(&self, state: ProducerState) {
        *self.state.write() = state;
    }
}

/// Why the worker loop stopped
enum Exit {
    EndOfStream,
    Cancelled,
    Framing(FramingError),
    Buffer(BufferError),
}

/// Reads one stream and appends its decoded events to a buffer
pub struct StreamEventProducer<E> {
    source: SourceIdentifier,
    decoder: Arc<dyn EventDecoder<E>>,
    buffer: Arc<dyn AppendOperation<EventWrapper<E>>>,
    frames: FrameCodec,
    reader: Mutex<Option<BoxedReader>>,
    started: AtomicBool,
    closed: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl<E> StreamEventProducer<E>
where
    E: Send + 'static,
{
    /// Create a producer over a length-prefixed stream
    pub fn new<R>(
        source: SourceIdentifier,
        reader: R,
        decoder: Arc<dyn EventDecoder<E>>,
        buffer: Arc<dyn AppendOperation<EventWrapper<E>>>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            source,
            decoder,
            buffer,
            frames: Framing::LengthPrefixed.into(),
            reader: Mutex::new(Some(Box::new(reader))),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            handle: Mutex::new(None),
            shared: Arc::new(Shared {
                state: RwLock::new(ProducerState::Created),
                stats: ProducerStats::default(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Use a different framing or frame size limit
    pub fn with_frame_codec(mut self, frames: FrameCodec) -> Self {
        self.frames = frames;
        self
    }

    /// Tie this producer to an outside token, typically a child token of a
    /// dispatcher, so that cancelling the parent cancels it too
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.cancel = cancel;
        }
        self
    }

    pub fn source(&self) -> &SourceIdentifier {
        &self.source
    }

    pub fn state(&self) -> ProducerState {
        *self.shared.state.read()
    }

    pub fn stats(&self) -> ProducerStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Spawn the worker on the current runtime
    pub fn start(&self) -> IngestResult<()> {
        let worker = self.take_worker()?;
        *self.handle.lock() = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Spawn the worker on `tracker`, so it can be awaited with the tracker
    pub fn start_on(&self, tracker: &TaskTracker) -> IngestResult<()> {
        let worker = self.take_worker()?;
        *self.handle.lock() = Some(tracker.spawn(worker.run()));
        Ok(())
    }

    #[instrument(skip_all, fields(source = %self.source))]
    fn take_worker(&self) -> IngestResult<Worker<E>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(IngestError::AlreadyStarted);
        }
        let reader = self.reader.lock().take().ok_or(IngestError::Closed)?;

        self.shared.set_state(ProducerState::Running);
        debug!(framing = ?self.frames.framing(), "Starting producer");

        Ok(Worker {
            source: self.source.clone(),
            decoder: self.decoder.clone(),
            buffer: self.buffer.clone(),
            frames: self.frames.clone(),
            reader,
            shared: self.shared.clone(),
        })
    }

    /// Stop reading and release the stream
    ///
    /// Safe to call any number of times and from any task. A running worker
    /// unwinds at its next suspension point and appends the sentinel itself;
    /// a producer that never started drops its stream and appends the
    /// sentinel here.
    #[instrument(skip_all, fields(source = %self.source))]
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.cancel.cancel();

        if let Some(reader) = self.reader.lock().take() {
            drop(reader);
            let sentinel = EventWrapper::terminal(EventIdentifier::new(self.source.clone(), 1));
            if let Err(e) = self.buffer.add(sentinel) {
                warn!(error = %e, "Failed to append terminal sentinel");
            }
            self.shared.set_state(ProducerState::Closed);
            debug!("Closed producer before start");
        }
    }

    /// Wait for the worker to finish
    ///
    /// Returns immediately if the worker was never started or already joined.
    pub async fn join(&self) -> IngestResult<()> {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| IngestError::Task(e.to_string()))?;
        }
        Ok(())
    }
}

struct Worker<E> {
    source: SourceIdentifier,
    decoder: Arc<dyn EventDecoder<E>>,
    buffer: Arc<dyn AppendOperation<EventWrapper<E>>>,
    frames: FrameCodec,
    reader: BoxedReader,
    shared: Arc<Shared>,
}

impl<E> Worker<E>
where
    E: Send + 'static,
{
    async fn run(self) {
        let Worker {
            source,
            decoder,
            buffer,
            frames,
            reader,
            shared,
        } = self;
        let stats = &shared.stats;
        let mut framed = FramedRead::new(reader, frames);
        let mut next_id: u64 = 1;

        let exit = loop {
            let frame = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => break Exit::Cancelled,
                frame = framed.next() => frame,
            };

            let payload = match frame {
                None => break Exit::EndOfStream,
                Some(Err(e)) => break Exit::Framing(e),
                Some(Ok(payload)) => payload,
            };
            stats.frames.fetch_add(1, Ordering::Relaxed);

            if payload.is_empty() {
                stats.empty_frames.fetch_add(1, Ordering::Relaxed);
                trace!(source = %source, "Skipping empty frame");
                continue;
            }

            match decoder.decode(&payload) {
                Ok(event) => {
                    let id = EventIdentifier::new(source.clone(), next_id);
                    if let Err(e) = buffer.add(EventWrapper::new(id, event)) {
                        break Exit::Buffer(e);
                    }
                    next_id += 1;
                    stats.events.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        source = %source,
                        frame = stats.frames.load(Ordering::Relaxed),
                        bytes = payload.len(),
                        error = %e,
                        "Skipping undecodable frame"
                    );
                }
            }
        };

        // Release the stream before announcing the end.
        drop(framed);

        let sentinel = EventWrapper::terminal(EventIdentifier::new(source.clone(), next_id));
        if let Err(e) = buffer.add(sentinel) {
            warn!(source = %source, error = %e, "Failed to append terminal sentinel");
        }

        let snapshot = stats.snapshot();
        match exit {
            Exit::EndOfStream => {
                shared.set_state(ProducerState::Closed);
                info!(
                    source = %source,
                    events = snapshot.events,
                    decode_failures = snapshot.decode_failures,
                    "Source reached end of stream"
                );
            }
            Exit::Cancelled => {
                shared.set_state(ProducerState::Closed);
                info!(source = %source, events = snapshot.events, "Producer cancelled");
            }
            Exit::Framing(e) => {
                shared.set_state(ProducerState::Failed);
                warn!(
                    source = %source,
                    events = snapshot.events,
                    error = %e,
                    "Producer failed on framing error"
                );
            }
            Exit::Buffer(e) => {
                shared.set_state(ProducerState::Failed);
                warn!(
                    source = %source,
                    events = snapshot.events,
                    error = %e,
                    "Producer failed to append to buffer"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::BytesMut;
    use tokio_util::codec::Encoder;

    use sluice_codec::LengthPrefixedCodec;
    use sluice_core::DecodeError;
    use sluice_storage::CircularBuffer;

    /// Decodes UTF-8 payloads, rejecting anything starting with `!`
    struct TextDecoder;

    impl EventDecoder<String> for TextDecoder {
        fn decode(&self, bytes: &[u8]) -> Result<String, DecodeError> {
            let text = std::str::from_utf8(bytes)?;
            if text.starts_with('!') {
                return Err(DecodeError::malformed("bang"));
            }
            Ok(text.to_string())
        }
    }

    fn wire(payloads: &[Option<&str>]) -> Vec<u8> {
        let mut codec = LengthPrefixedCodec::new();
        let mut out = BytesMut::new();
        for payload in payloads {
            codec.encode(payload.map(str::as_bytes), &mut out).unwrap();
        }
        out.to_vec()
    }

    fn producer(
        bytes: Vec<u8>,
    ) -> (
        StreamEventProducer<String>,
        Arc<CircularBuffer<EventWrapper<String>>>,
    ) {
        let buffer = Arc::new(CircularBuffer::new(100));
        let producer = StreamEventProducer::new(
            SourceIdentifier::new("test"),
            std::io::Cursor::new(bytes),
            Arc::new(TextDecoder),
            buffer.clone(),
        );
        (producer, buffer)
    }

    #[tokio::test]
    async fn test_events_then_sentinel() {
        let (producer, buffer) = producer(wire(&[Some("a"), Some("b"), Some("c")]));
        assert_eq!(producer.state(), ProducerState::Created);

        producer.start().unwrap();
        producer.join().await.unwrap();

        let items = buffer.snapshot();
        assert_eq!(items.len(), 4);
        let ids: Vec<u64> = items.iter().map(|w| w.local_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(items[2].event.as_deref(), Some("c"));
        assert!(items[3].is_terminal());
        assert_eq!(producer.state(), ProducerState::Closed);
    }

    #[tokio::test]
    async fn test_skips_empty_and_undecodable_frames() {
        let (producer, buffer) = producer(wire(&[Some("a"), None, Some("!bad"), Some("b")]));
        producer.start().unwrap();
        producer.join().await.unwrap();

        let events: Vec<_> = buffer
            .snapshot()
            .into_iter()
            .filter_map(|w| w.event)
            .collect();
        assert_eq!(events, vec!["a", "b"]);
        assert_eq!(
            producer.stats(),
            ProducerStatsSnapshot {
                frames: 4,
                events: 2,
                decode_failures: 1,
                empty_frames: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_negative_length_fails_producer() {
        let mut bytes = wire(&[Some("a")]);
        bytes.extend_from_slice(&(-1i32).to_be_bytes());
        let (producer, buffer) = producer(bytes);

        producer.start().unwrap();
        producer.join().await.unwrap();

        assert_eq!(producer.state(), ProducerState::Failed);
        let items = buffer.snapshot();
        assert_eq!(items.len(), 2);
        assert!(items[1].is_terminal());
        assert_eq!(items[1].local_id(), 2);
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (producer, _buffer) = producer(Vec::new());
        producer.start().unwrap();
        assert!(matches!(producer.start(), Err(IngestError::AlreadyStarted)));
        producer.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_before_start() {
        let (producer, buffer) = producer(wire(&[Some("a")]));
        producer.close();
        producer.close();

        assert_eq!(producer.state(), ProducerState::Closed);
        assert!(matches!(producer.start(), Err(IngestError::Closed)));
        let items = buffer.snapshot();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_terminal());
    }

    #[tokio::test]
    async fn test_close_while_blocked() {
        let (_writer, reader) = tokio::io::duplex(64);
        let buffer = Arc::new(CircularBuffer::new(10));
        let producer = StreamEventProducer::new(
            SourceIdentifier::new("idle"),
            reader,
            Arc::new(TextDecoder),
            buffer.clone(),
        );

        producer.start().unwrap();
        assert_eq!(producer.state(), ProducerState::Running);

        producer.close();
        producer.join().await.unwrap();
        assert_eq!(producer.state(), ProducerState::Closed);
        assert_eq!(buffer.size(), 1);
        assert!(buffer.snapshot()[0].is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ProducerState::Failed.to_string(), "failed");
        assert!(ProducerState::Closed.is_terminal());
        assert!(!ProducerState::Running.is_terminal());
    }
}
