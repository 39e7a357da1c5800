//! Table of active sources
//!
//! Connections from the same host must not share a [`SourceIdentifier`], or
//! their sequence numbers would collide in the buffers. The registry hands
//! out a distinct identifier per connection and stops tracking it as active
//! when the connection's [`SourceLease`] is dropped. An identifier is never
//! handed out twice, so a host that reconnects starts a fresh source instead
//! of continuing one that already ended.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use sluice_core::SourceIdentifier;

#[derive(Debug, Default)]
struct Table {
    active: BTreeSet<SourceIdentifier>,
    /// Identifiers issued so far per name
    issued: HashMap<String, u32>,
}

/// Set of currently active sources, safe to share between tasks
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    table: Arc<Mutex<Table>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source named `identifier`
    ///
    /// The first source ever registered with a name gets no secondary part.
    /// Every later one, concurrent or not, gets the next number from 2 up.
    pub fn register(&self, identifier: impl Into<String>) -> SourceLease {
        let identifier = identifier.into();
        let mut table = self.table.lock();

        let issued = table.issued.entry(identifier.clone()).or_insert(0);
        *issued += 1;
        let source = match *issued {
            1 => SourceIdentifier::new(identifier),
            n => SourceIdentifier::with_secondary(identifier, n.to_string()),
        };
        table.active.insert(source.clone());
        debug!(source = %source, active = table.active.len(), "Registered source");

        SourceLease {
            source,
            table: self.table.clone(),
        }
    }

    /// Currently active sources, sorted
    pub fn active(&self) -> Vec<SourceIdentifier> {
        self.table.lock().active.iter().cloned().collect()
    }

    pub fn contains(&self, source: &SourceIdentifier) -> bool {
        self.table.lock().active.contains(source)
    }

    pub fn len(&self) -> usize {
        self.table.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a source identifier; dropping it unregisters the source
#[derive(Debug)]
pub struct SourceLease {
    source: SourceIdentifier,
    table: Arc<Mutex<Table>>,
}

impl SourceLease {
    pub fn source(&self) -> &SourceIdentifier {
        &self.source
    }
}

impl Drop for SourceLease {
    fn drop(&mut self) {
        self.table.lock().active.remove(&self.source);
        debug!(source = %self.source, "Unregistered source");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_source_has_no_secondary() {
        let registry = SourceRegistry::new();
        let lease = registry.register("10.0.0.1");
        assert_eq!(lease.source(), &SourceIdentifier::new("10.0.0.1"));
        assert!(registry.contains(lease.source()));
    }

    #[test]
    fn test_duplicates_are_numbered() {
        let registry = SourceRegistry::new();
        let a = registry.register("host");
        let b = registry.register("host");
        let c = registry.register("host");
        let other = registry.register("elsewhere");

        assert_eq!(a.source().secondary, None);
        assert_eq!(b.source().secondary.as_deref(), Some("2"));
        assert_eq!(c.source().secondary.as_deref(), Some("3"));
        assert_eq!(other.source().secondary, None);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_numbers_are_never_reused() {
        let registry = SourceRegistry::new();
        let _a = registry.register("host");
        let b = registry.register("host");
        let _c = registry.register("host");

        drop(b);
        assert_eq!(registry.len(), 2);

        let d = registry.register("host");
        assert_eq!(d.source().secondary.as_deref(), Some("4"));
    }

    #[test]
    fn test_reconnect_gets_fresh_identifier() {
        let registry = SourceRegistry::new();
        let first = registry.register("host");
        let first_source = first.source().clone();
        drop(first);
        assert!(registry.is_empty());

        let second = registry.register("host");
        assert_ne!(second.source(), &first_source);
        assert_eq!(second.source(), &SourceIdentifier::with_secondary("host", "2"));
        assert_eq!(registry.active(), vec![second.source().clone()]);
    }

    #[test]
    fn test_concurrent_registration_is_unique() {
        let registry = SourceRegistry::new();
        let leases: Vec<SourceLease> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.register("host")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let unique: BTreeSet<_> = leases.iter().map(|l| l.source().clone()).collect();
        assert_eq!(unique.len(), 8);
        drop(leases);
        assert!(registry.is_empty());
    }
}
