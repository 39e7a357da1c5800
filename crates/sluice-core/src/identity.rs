//! Source and event identities
//!
//! A [`SourceIdentifier`] names one logical origin of events (a connected
//! host, a file, an in-process appender). Every event appended for that
//! source gets an [`EventIdentifier`] whose `local_id` is strictly increasing
//! and contiguous from 1.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Identifies the origin of a stream of events
///
/// Equality is by both fields, so two connections from the same host are
/// told apart by `secondary`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceIdentifier {
    /// Logical name, usually a host address or application name
    pub identifier: String,
    /// Optional distinguishing path, address or counter
    pub secondary: Option<String>,
}

impl SourceIdentifier {
    /// Create a source identifier without a secondary part
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secondary: None,
        }
    }

    /// Create a source identifier with a secondary part
    pub fn with_secondary(identifier: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secondary: Some(secondary.into()),
        }
    }
}

impl Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(f, "{}-{}", self.identifier, secondary),
            None => write!(f, "{}", self.identifier),
        }
    }
}

/// A source plus the local sequence number of one of its events
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventIdentifier {
    pub source: SourceIdentifier,
    pub local_id: u64,
}

impl EventIdentifier {
    pub fn new(source: SourceIdentifier, local_id: u64) -> Self {
        Self { source, local_id }
    }
}

impl Display for EventIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.source, self.local_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_identifier_display() {
        assert_eq!(SourceIdentifier::new("10.0.0.1").to_string(), "10.0.0.1");
        assert_eq!(
            SourceIdentifier::with_secondary("10.0.0.1", "2").to_string(),
            "10.0.0.1-2"
        );
    }

    #[test]
    fn test_source_identifier_equality_uses_secondary() {
        let a = SourceIdentifier::new("host");
        let b = SourceIdentifier::with_secondary("host", "2");
        assert_ne!(a, b);
        assert_eq!(a, SourceIdentifier::new("host"));
    }

    #[test]
    fn test_event_identifier_ordering() {
        let source = SourceIdentifier::new("app");
        let first = EventIdentifier::new(source.clone(), 1);
        let second = EventIdentifier::new(source, 2);
        assert!(first < second);
        assert_eq!(second.to_string(), "app#2");
    }
}
