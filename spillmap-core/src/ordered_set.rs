//! Thread-safe insertion-ordered set.
//!
//! Per spec.md §9's own design notes, this supersedes an earlier
//! heap-plus-monotonic-counter scheme: eviction from either end is O(1)
//! amortized, a "touch" is a cheap discard-then-insert, there is no counter
//! to saturate, and iteration tolerates concurrent mutation by construction
//! (a snapshot, not a live cursor). Backed by `indexmap::IndexSet`, the same
//! primitive `velesdb-core`'s cache module uses for its own move-to-back
//! LRU bookkeeping.

use std::hash::Hash;

use indexmap::IndexSet;
use parking_lot::Mutex;

/// An insertion-ordered, set-semantic collection: re-inserting an existing
/// element is a no-op that does not change its position. Front = oldest,
/// back = newest.
///
/// All operations lock internally; callers never see a torn intermediate
/// state, and removal methods are no-ops (not panics) when the element is
/// already gone, so a thread racing an eviction or a restore against this
/// set never needs to retry by hand.
#[derive(Debug)]
pub struct InsertionOrderedSet<K> {
    inner: Mutex<IndexSet<K, ahash::RandomState>>,
}

impl<K> Default for InsertionOrderedSet<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> InsertionOrderedSet<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty set.
    pub fn new() -> Self {
        InsertionOrderedSet {
            inner: Mutex::new(IndexSet::with_hasher(ahash::RandomState::new())),
        }
    }

    /// Builds a set from an initial iterator, in iteration order.
    pub fn from_iter_ordered<I: IntoIterator<Item = K>>(items: I) -> Self {
        let set = Self::new();
        {
            let mut inner = set.inner.lock();
            for item in items {
                inner.insert(item);
            }
        }
        set
    }

    /// Inserts `key` at the back (most-recently-inserted end). A no-op,
    /// without moving the existing element, if `key` is already present.
    pub fn insert(&self, key: K) {
        self.inner.lock().insert(key);
    }

    /// Removes `key` and re-inserts it at the back. No-op (does not insert)
    /// if `key` was never present — used for LRU "touch" semantics, where a
    /// concurrent eviction of the same key must not resurrect it.
    pub fn touch(&self, key: &K) {
        let mut inner = self.inner.lock();
        if inner.shift_remove(key) {
            inner.insert(key.clone());
        }
    }

    /// Removes `key` if present. Returns whether it was present.
    ///
    /// Named `discard` (not `remove`) to signal that removing an
    /// already-absent key is expected, not an error: a concurrent eviction
    /// may have already removed it.
    pub fn discard(&self, key: &K) -> bool {
        self.inner.lock().shift_remove(key)
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Returns (without removing) the oldest element, if any.
    pub fn front(&self) -> Option<K> {
        self.inner.lock().get_index(0).cloned()
    }

    /// Removes and returns the oldest element, if any.
    pub fn pop_front(&self) -> Option<K> {
        self.inner.lock().shift_remove_index(0)
    }

    /// Removes and returns the newest element, if any.
    pub fn pop_back(&self) -> Option<K> {
        let mut inner = self.inner.lock();
        let last = inner.len().checked_sub(1)?;
        inner.shift_remove_index(last)
    }

    /// Snapshot of every element, in insertion order. A live cursor is
    /// deliberately not exposed: spec.md guarantees iteration survives
    /// concurrent mutation by being a point-in-time copy, not a reference
    /// into state another thread could be evicting from underneath it.
    pub fn snapshot(&self) -> Vec<K> {
        self.inner.lock().iter().cloned().collect()
    }
}
