//! Append capability required from destination buffers
//!
//! Ingestion never reads from a buffer. It only appends wrapped events and,
//! when a source ends, appends the terminal sentinel.

use std::sync::Arc;

use crate::error::BufferError;

/// Append-only ingestion into a buffer
///
/// Implementations must accept concurrent appends from many producers.
pub trait AppendOperation<T>: Send + Sync {
    /// Append a single element
    fn add(&self, element: T) -> Result<(), BufferError>;

    /// Append a batch of elements in order
    ///
    /// Buffers that cannot do this atomically keep the default, which fails
    /// instead of dropping anything.
    fn add_all(&self, elements: Vec<T>) -> Result<(), BufferError> {
        let _ = elements;
        Err(BufferError::Unsupported("add_all"))
    }
}

impl<T, B> AppendOperation<T> for Arc<B>
where
    B: AppendOperation<T> + ?Sized,
{
    fn add(&self, element: T) -> Result<(), BufferError> {
        (**self).add(element)
    }

    fn add_all(&self, elements: Vec<T>) -> Result<(), BufferError> {
        (**self).add_all(elements)
    }
}
