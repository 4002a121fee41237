//! # Callback Registries
//!
//! Presence, records, events, and listen responders all hand user closures
//! to the node. [`CallbackSet`] is the shared registry shape: insertion
//! returns a [`SubscriptionId`] ticket, removal takes the ticket back.
//!
//! ## Snapshot-then-fire
//!
//! Registries live behind `parking_lot` locks, which are not reentrant. A
//! callback that re-enters the owning service (subscribing from inside a
//! notification, say) would deadlock if fired under the lock. Callers MUST
//! therefore [`CallbackSet::snapshot`] under the lock, drop it, and invoke
//! the clones outside.

use std::sync::Arc;

/// Opaque ticket identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An ordered registry of shared callbacks.
///
/// Entries fire in insertion order. `F` is typically a `dyn Fn(..)` trait
/// object; `Arc` lets snapshots outlive the registry lock.
#[derive(Debug)]
pub struct CallbackSet<F: ?Sized> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Arc<F>)>,
}

impl<F: ?Sized> CallbackSet<F> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register a callback and return the ticket that removes it.
    pub fn insert(&mut self, callback: Arc<F>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Remove a callback by ticket. Returns `false` for unknown or
    /// already-removed tickets.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Clone the registered callbacks for firing outside the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<F: ?Sized> Default for CallbackSet<F> {
    fn default() -> Self {
        Self::new()
    }
}
