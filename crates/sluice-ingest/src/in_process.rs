//! In-process source
//!
//! Events emitted inside this process arrive as foreign framework objects,
//! not bytes. They skip framing and decoding: a [`Converter`] turns them into
//! canonical events, which are appended with the same identity and sentinel
//! rules as a stream producer.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use sluice_convert::Converter;
use sluice_core::{AppendOperation, BufferError, EventIdentifier, EventWrapper, SourceIdentifier};

use crate::error::IngestResult;

#[derive(Debug)]
struct Sequence {
    next_id: u64,
    closed: bool,
}

/// Appends converted in-process events to a buffer
///
/// Appends are serialized, so local ids are contiguous and reach the buffer
/// in order even when many threads emit concurrently.
pub struct InProcessSource<C: Converter> {
    source: SourceIdentifier,
    converter: C,
    buffer: Arc<dyn AppendOperation<EventWrapper<C::Canonical>>>,
    sequence: Mutex<Sequence>,
}

impl<C: Converter> InProcessSource<C> {
    pub fn new(
        source: SourceIdentifier,
        converter: C,
        buffer: Arc<dyn AppendOperation<EventWrapper<C::Canonical>>>,
    ) -> Self {
        Self {
            source,
            converter,
            buffer,
            sequence: Mutex::new(Sequence {
                next_id: 1,
                closed: false,
            }),
        }
    }

    pub fn source(&self) -> &SourceIdentifier {
        &self.source
    }

    /// Events appended so far
    pub fn appended(&self) -> u64 {
        self.sequence.lock().next_id - 1
    }

    pub fn is_closed(&self) -> bool {
        self.sequence.lock().closed
    }

    /// Convert and append one event
    ///
    /// Returns the assigned local id, or `None` when the converter produced
    /// nothing.
    pub fn append(&self, foreign: &C::Foreign) -> IngestResult<Option<u64>> {
        let canonical = self.converter.convert(Some(foreign));
        self.push(canonical)
    }

    /// Like [`append`](Self::append) for a type-erased event
    ///
    /// An event of the wrong type is a wiring mistake and is returned as
    /// [`IngestError::Conversion`](crate::IngestError::Conversion).
    pub fn append_any(&self, foreign: &dyn Any) -> IngestResult<Option<u64>> {
        let canonical = self.converter.convert_any(Some(foreign))?;
        self.push(canonical)
    }

    /// Convert and append a batch through the buffer's bulk append
    ///
    /// If the buffer rejects the batch nothing is appended and no ids are
    /// used up.
    pub fn append_all(&self, foreign: &[C::Foreign]) -> IngestResult<usize> {
        let mut sequence = self.sequence.lock();
        if sequence.closed {
            return Err(BufferError::Closed.into());
        }

        let wrappers: Vec<_> = foreign
            .iter()
            .filter_map(|f| self.converter.convert(Some(f)))
            .enumerate()
            .map(|(i, event)| {
                let id = EventIdentifier::new(self.source.clone(), sequence.next_id + i as u64);
                EventWrapper::new(id, event)
            })
            .collect();
        let count = wrappers.len();

        self.buffer.add_all(wrappers)?;
        sequence.next_id += count as u64;
        trace!(source = %self.source, count, "Appended batch");
        Ok(count)
    }

    fn push(&self, canonical: Option<C::Canonical>) -> IngestResult<Option<u64>> {
        let mut sequence = self.sequence.lock();
        if sequence.closed {
            return Err(BufferError::Closed.into());
        }
        let Some(event) = canonical else {
            debug!(source = %self.source, "Converter produced no event");
            return Ok(None);
        };

        let local_id = sequence.next_id;
        self.buffer
            .add(EventWrapper::new(EventIdentifier::new(self.source.clone(), local_id), event))?;
        sequence.next_id += 1;
        Ok(Some(local_id))
    }

    /// Append the terminal sentinel; later calls do nothing
    pub fn close(&self) -> IngestResult<()> {
        let mut sequence = self.sequence.lock();
        if sequence.closed {
            return Ok(());
        }
        sequence.closed = true;

        let sentinel =
            EventWrapper::terminal(EventIdentifier::new(self.source.clone(), sequence.next_id));
        if let Err(e) = self.buffer.add(sentinel) {
            warn!(source = %self.source, error = %e, "Failed to append terminal sentinel");
            return Err(e.into());
        }
        info!(source = %self.source, events = sequence.next_id - 1, "In-process source closed");
        Ok(())
    }
}
