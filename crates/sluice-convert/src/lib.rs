//! Converters from foreign event shapes to sluice canonical events
//!
//! Each converter handles one foreign shape and is a pure mapping. Level
//! mappings are total and order-preserving; a level with no canonical
//! equivalent is mapped by severity and its original label is kept in the
//! MDC under [`ORIGINAL_LEVEL_KEY`].
//!
//! - [`Log4jConverter`]: [`Log4jEvent`] to [`LoggingEvent`](sluice_core::LoggingEvent)
//! - [`JulConverter`]: [`JulRecord`] to [`LoggingEvent`](sluice_core::LoggingEvent)
//! - [`HttpAccessConverter`]: [`HttpAccessRecord`] to [`AccessEvent`](sluice_core::AccessEvent)

pub mod access;
pub mod converter;
pub mod jul;
pub mod log4j;
pub mod throwable;

// Re-exports for convenience
pub use access::{HttpAccessConverter, HttpAccessRecord};
pub use converter::Converter;
pub use jul::{JulConverter, JulLevel, JulRecord};
pub use log4j::{Log4jConverter, Log4jEvent, Log4jLevel, ORIGINAL_LEVEL_KEY};
pub use throwable::{ForeignFrame, ForeignThrowable, MAX_THROWABLE_DEPTH};
