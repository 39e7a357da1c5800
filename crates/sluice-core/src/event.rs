//! Event envelope appended to buffers

use serde::{Deserialize, Serialize};

use crate::identity::{EventIdentifier, SourceIdentifier};

/// An event tagged with its identity
///
/// A wrapper without an event is the terminal sentinel: it is the last thing
/// a producer ever appends for its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWrapper<E> {
    pub event_identifier: EventIdentifier,
    pub event: Option<E>,
}

impl<E> EventWrapper<E> {
    /// Wrap a decoded event
    pub fn new(event_identifier: EventIdentifier, event: E) -> Self {
        Self {
            event_identifier,
            event: Some(event),
        }
    }

    /// Create the end-of-stream marker for a source
    pub fn terminal(event_identifier: EventIdentifier) -> Self {
        Self {
            event_identifier,
            event: None,
        }
    }

    /// Whether this wrapper marks the end of its source
    pub fn is_terminal(&self) -> bool {
        self.event.is_none()
    }

    pub fn source(&self) -> &SourceIdentifier {
        &self.event_identifier.source
    }

    pub fn local_id(&self) -> u64 {
        self.event_identifier.local_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_wrapper() {
        let id = EventIdentifier::new(SourceIdentifier::new("a"), 4);
        let wrapper: EventWrapper<String> = EventWrapper::terminal(id);
        assert!(wrapper.is_terminal());
        assert_eq!(wrapper.local_id(), 4);
    }

    #[test]
    fn test_event_wrapper() {
        let id = EventIdentifier::new(SourceIdentifier::new("a"), 1);
        let wrapper = EventWrapper::new(id, "payload".to_string());
        assert!(!wrapper.is_terminal());
        assert_eq!(wrapper.source().identifier, "a");
        assert_eq!(wrapper.event.as_deref(), Some("payload"));
    }
}
