//! The `Mapping` abstraction and a minimal in-memory leaf implementation.
//!
//! Every composable piece in this crate (`Lru`, `Buffer`) both implements
//! `Mapping` and wraps another `Mapping`. Leaf storage — the bottom of the
//! stack — just implements `Mapping` directly. [`MemoryLeaf`] is the
//! in-memory leaf this crate ships; a real on-disk leaf (the `File`/LMDB
//! external collaborators of spec.md §6) is left to the caller.

use std::hash::Hash;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// An ordered mutable key/value container.
///
/// Keys are hashable and cheap to clone (implementations hand back owned
/// keys from `keys()`/`evict()` rather than references, since a composed
/// stack may move a key between tiers on another thread between the call
/// and the caller reading the result).
pub trait Mapping {
    /// The key type.
    type Key: Eq + Hash + Clone;
    /// The value type.
    type Value: Clone;

    /// Returns the value for `key`, or [`Error::NotFound`].
    fn get(&self, key: &Self::Key) -> Result<Self::Value>;

    /// Inserts or replaces the value for `key`.
    fn put(&self, key: Self::Key, value: Self::Value) -> Result<()>;

    /// Removes `key`, or fails with [`Error::NotFound`] if absent.
    fn delete(&self, key: &Self::Key) -> Result<()>;

    /// True if `key` is present. Never fails.
    fn contains(&self, key: &Self::Key) -> bool;

    /// Number of live keys.
    fn len(&self) -> usize;

    /// True if there are no live keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every live key, in this mapping's iteration order.
    fn keys(&self) -> Vec<Self::Key>;

    /// Bulk insert. The default implementation is `put` in a loop, which is
    /// equivalent to updating from a mapping one pair at a time;
    /// implementations that can batch more cheaply (e.g. a single
    /// underlying-store `update()` call) should override this.
    fn update<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = (Self::Key, Self::Value)>,
    {
        for (k, v) in items {
            self.put(k, v)?;
        }
        Ok(())
    }

    /// Best-effort durability flush. No-op unless overridden.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Releases any resources held by this mapping. No-op unless
    /// overridden.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// An evicting `Mapping`: one that enforces a weight bound and can be told
/// to commit an entry without immediately triggering eviction, or to run
/// eviction to a target on demand. Implemented by [`crate::lru::Lru`] and
/// [`crate::buffer::Buffer`].
pub trait Evicting: Mapping {
    /// Current total weight of all live entries.
    fn total_weight(&self) -> f64;

    /// Inserts or replaces `key`, recomputing its weight, without running
    /// eviction afterwards — even if the resulting total exceeds the
    /// configured bound.
    fn set_noevict(&self, key: Self::Key, value: Self::Value) -> Result<()>;

    /// Evicts the next victim (heavy-first, then oldest), invoking
    /// `on_evict` callbacks before committing the removal. Fails with
    /// [`Error::Empty`] if there are no keys.
    fn evict(&self) -> Result<(Self::Key, Self::Value, f64)>;

    /// Evicts a specific key, following the same callback/rollback
    /// protocol as [`Evicting::evict`].
    fn evict_key(&self, key: &Self::Key) -> Result<(Self::Key, Self::Value, f64)>;

    /// Repeatedly evicts while `total_weight() > target` and the mapping
    /// is neither empty nor closed.
    fn evict_until_below_target(&self, target: f64) -> Result<()>;
}

/// The simplest leaf `Mapping`: an insertion-ordered in-memory dictionary
/// behind a single lock. Typical use is as the `d` a [`crate::lru::Lru`]
/// wraps, or as either tier of a [`crate::buffer::Buffer`] in tests.
#[derive(Debug)]
pub struct MemoryLeaf<K, V> {
    inner: Mutex<IndexMap<K, V, ahash::RandomState>>,
}

impl<K, V> Default for MemoryLeaf<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoryLeaf<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty leaf.
    pub fn new() -> Self {
        MemoryLeaf {
            inner: Mutex::new(IndexMap::with_hasher(ahash::RandomState::new())),
        }
    }
}

impl<K, V> Mapping for MemoryLeaf<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> Result<V> {
        self.inner.lock().get(key).cloned().ok_or(Error::NotFound)
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        self.inner.lock().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &K) -> Result<()> {
        self.inner
            .lock()
            .shift_remove(key)
            .map(|_| ())
            .ok_or(Error::NotFound)
    }

    fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains_key(key)
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn keys(&self) -> Vec<K> {
        self.inner.lock().keys().cloned().collect()
    }
}
