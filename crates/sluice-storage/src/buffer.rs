//! Bounded in-memory buffer
//!
//! Append-only and capacity-bounded: once full, every append evicts the
//! oldest element. Elements keep their absolute insertion index, so readers
//! tailing the buffer can resume from the last index they saw and learn from
//! [`CircularBuffer::overflow`] how much they missed.

use std::collections::VecDeque;

use parking_lot::RwLock;
use tracing::trace;

use sluice_core::{AppendOperation, BufferError};

/// Default number of elements kept per buffer
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct Inner<T> {
    elements: VecDeque<T>,
    total_added: u64,
}

impl<T> Inner<T> {
    fn overflow(&self) -> u64 {
        self.total_added - self.elements.len() as u64
    }

    fn push(&mut self, capacity: usize, element: T) {
        if self.elements.len() == capacity {
            self.elements.pop_front();
        }
        self.elements.push_back(element);
        self.total_added += 1;
    }
}

/// Capacity-bounded, append-only buffer safe for concurrent use
///
/// Writers hold the lock only to push; readers clone elements out under a
/// read lock, so neither side keeps the other waiting for long.
#[derive(Debug)]
pub struct CircularBuffer<T> {
    capacity: usize,
    inner: RwLock<Inner<T>>,
}

impl<T: Clone> Default for CircularBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T: Clone> CircularBuffer<T> {
    /// Create a buffer holding at most `capacity` elements (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(Inner {
                elements: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                total_added: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements currently held
    pub fn size(&self) -> usize {
        self.inner.read().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.capacity
    }

    /// Number of elements ever appended
    pub fn total_added(&self) -> u64 {
        self.inner.read().total_added
    }

    /// Number of elements evicted to make room
    pub fn overflow(&self) -> u64 {
        self.inner.read().overflow()
    }

    /// Element at absolute insertion index `index`, unless evicted or not yet added
    pub fn get(&self, index: u64) -> Option<T> {
        let inner = self.inner.read();
        let offset = index.checked_sub(inner.overflow())?;
        inner.elements.get(usize::try_from(offset).ok()?).cloned()
    }

    /// Up to `max` elements starting at absolute index `start`
    ///
    /// Starting before the oldest retained element begins at the oldest one.
    pub fn range(&self, start: u64, max: usize) -> Vec<T> {
        let inner = self.inner.read();
        let offset = start.saturating_sub(inner.overflow());
        let Ok(offset) = usize::try_from(offset) else {
            return Vec::new();
        };
        inner.elements.iter().skip(offset).take(max).cloned().collect()
    }

    /// Copy of all retained elements, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.read().elements.iter().cloned().collect()
    }

    /// Drop all elements; insertion indexes keep counting
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let dropped = inner.elements.len();
        inner.elements.clear();
        // Cleared elements count as overflow so later indexes stay stable.
        trace!(dropped, "Cleared buffer");
    }
}

impl<T> AppendOperation<T> for CircularBuffer<T>
where
    T: Clone + Send + Sync,
{
    fn add(&self, element: T) -> Result<(), BufferError> {
        self.inner.write().push(self.capacity, element);
        Ok(())
    }

    fn add_all(&self, elements: Vec<T>) -> Result<(), BufferError> {
        let mut inner = self.inner.write();
        for element in elements {
            inner.push(self.capacity, element);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn test_append_and_get() {
        let buffer = CircularBuffer::new(4);
        for i in 0..3 {
            buffer.add(i).unwrap();
        }
        assert_eq!(buffer.size(), 3);
        assert_eq!(buffer.get(0), Some(0));
        assert_eq!(buffer.get(2), Some(2));
        assert_eq!(buffer.get(3), None);
        assert!(!buffer.is_full());
    }

    #[test]
    fn test_eviction_keeps_absolute_indexes() {
        let buffer = CircularBuffer::new(3);
        buffer.add_all((0..5).collect()).unwrap();

        assert!(buffer.is_full());
        assert_eq!(buffer.total_added(), 5);
        assert_eq!(buffer.overflow(), 2);
        assert_eq!(buffer.get(1), None);
        assert_eq!(buffer.get(2), Some(2));
        assert_eq!(buffer.get(4), Some(4));
        assert_eq!(buffer.snapshot(), vec![2, 3, 4]);
    }

    #[test]
    fn test_range() {
        let buffer = CircularBuffer::new(5);
        buffer.add_all((0..8).collect()).unwrap();

        assert_eq!(buffer.range(0, 2), vec![3, 4]);
        assert_eq!(buffer.range(6, 10), vec![6, 7]);
        assert!(buffer.range(8, 10).is_empty());
    }

    #[test]
    fn test_clear_keeps_counting() {
        let buffer = CircularBuffer::new(5);
        buffer.add_all(vec![1, 2, 3]).unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.overflow(), 3);

        buffer.add(4).unwrap();
        assert_eq!(buffer.get(3), Some(4));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = CircularBuffer::new(0);
        buffer.add("a").unwrap();
        buffer.add("b").unwrap();
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot(), vec!["b"]);
    }

    #[test]
    fn test_concurrent_writers() {
        let buffer = Arc::new(CircularBuffer::new(1000));
        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        buffer.add((writer, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(buffer.total_added(), 400);
        for writer in 0..4 {
            let own: Vec<i32> = buffer
                .snapshot()
                .into_iter()
                .filter(|(w, _)| *w == writer)
                .map(|(_, i)| i)
                .collect();
            assert_eq!(own, (0..100).collect::<Vec<_>>());
        }
    }
}
