//! # Two-tier spill buffer
//!
//! [`Buffer`] composes a capacity-bounded `fast` tier (an internal
//! [`Lru`]) with an unbounded `slow` tier. Entries that no longer fit in
//! `fast` are demoted to `slow`; a subsequent read promotes them back.
//!
//! ## Protocols
//!
//! - **Demotion** (`fast` → `slow`): wired as `fast`'s own `on_evict`
//!   callback. If writing to `slow` fails, the callback's error bubbles
//!   straight out of `fast`'s exception-safe eviction machinery and the
//!   victim never leaves `fast` — no separate rollback code needed here.
//! - **Restore** (`slow` → `fast`, on `get`): the value is read from
//!   `slow` without holding any lock across that read, a per-key
//!   "restoring" flag is checked/cleared afterwards, and only if no
//!   concurrent write raced it and the value's weight still fits under
//!   `fast`'s bound is it written into `fast` (and optionally removed
//!   from `slow`, unless `keep_slow` is set) — a too-heavy value is left
//!   in `slow` untouched. Either way, `fast` is trimmed back under its
//!   bound and `slow_to_fast_callbacks` fire last.
//! - **Cancel-evict**: wired as `fast`'s `on_cancel_evict` callback. If a
//!   concurrent `set`/`delete` won a race against an in-flight demotion
//!   after the demotion's `slow.put` already ran, this callback deletes
//!   the now-stale `slow` copy.
//!
//! `keys` is the union of everything live in `fast` or `slow` — `fast`'s
//! own recency order only covers `fast`'s membership, so `Buffer` tracks
//! overall membership itself.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::lru::Lru;
use crate::mapping::{Evicting, Mapping};
use crate::ordered_set::InsertionOrderedSet;

type Callback<K, V> = Arc<dyn Fn(&K, &V) -> Result<()> + Send + Sync>;
type WeightFn<K, V> = Arc<dyn Fn(&K, &V) -> f64 + Send + Sync>;

/// A `Mapping` that keeps its hottest entries in a capacity-bounded
/// `fast` store and spills the rest to an unbounded `slow` store.
///
/// See the module documentation and spec.md §4.2 for the full contract.
pub struct Buffer<K, V, F, S>
where
    K: Eq + Hash + Clone,
{
    fast: Lru<K, V, F>,
    slow: Arc<S>,
    weight: WeightFn<K, V>,
    slow_to_fast_callbacks: Vec<Callback<K, V>>,
    restoring: Mutex<HashSet<K, ahash::RandomState>>,
    restore_cancelled: Mutex<HashSet<K, ahash::RandomState>>,
    keep_slow: bool,
    keys: InsertionOrderedSet<K>,
}

impl<K, V, F, S> Buffer<K, V, F, S>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<Key = K, Value = V>,
    S: Mapping<Key = K, Value = V> + Send + Sync + 'static,
{
    /// Builds a buffer with `fast` capped at weight `n` (constant weight 1
    /// per entry) and demoted entries fully moved (not duplicated) to
    /// `slow`.
    pub fn new(fast: F, slow: S, n: f64) -> Result<Self> {
        Self::with_options(fast, slow, n, false)
    }

    /// As [`Buffer::new`], but if `keep_slow` is true a key restored from
    /// `slow` to `fast` keeps its copy in `slow` rather than having it
    /// deleted — useful when `slow` doubles as a durable backup.
    pub fn with_options(fast: F, slow: S, n: f64, keep_slow: bool) -> Result<Self> {
        Self::with_weight(fast, slow, n, keep_slow, |_, _| 1.0)
    }

    /// As [`Buffer::with_options`], but with a custom per-entry weight
    /// function instead of constant weight 1 — mirrors [`Lru::with_weight`].
    pub fn with_weight<W>(fast: F, slow: S, n: f64, keep_slow: bool, weight: W) -> Result<Self>
    where
        W: Fn(&K, &V) -> f64 + Send + Sync + 'static,
    {
        Self::with_weight_and_callbacks(fast, slow, n, keep_slow, weight, Vec::new(), Vec::new())
    }

    /// The fully general constructor: a custom weight function plus the
    /// `fast_to_slow`/`slow_to_fast` callback lists run (in registration
    /// order) on demotion and restore respectively.
    ///
    /// A `fast_to_slow` callback runs after the victim's value has been
    /// written to `slow` but before it is removed from `fast`; a failure
    /// aborts the demotion and leaves the victim in `fast` (see
    /// [`Lru::with_on_evict`]'s exception-safety contract). A
    /// `slow_to_fast` callback runs at the end of [`Buffer::get`]'s restore
    /// path, after the value has (if light enough) already been written
    /// into `fast` and `fast` has been trimmed back under `n`; a failure
    /// propagates out of `get` but does not undo that write.
    pub fn with_weight_and_callbacks<W>(
        fast: F,
        slow: S,
        n: f64,
        keep_slow: bool,
        weight: W,
        fast_to_slow_callbacks: Vec<Callback<K, V>>,
        slow_to_fast_callbacks: Vec<Callback<K, V>>,
    ) -> Result<Self>
    where
        W: Fn(&K, &V) -> f64 + Send + Sync + 'static,
    {
        let slow = Arc::new(slow);
        let restoring: Mutex<HashSet<K, ahash::RandomState>> =
            Mutex::new(HashSet::with_hasher(ahash::RandomState::new()));
        let restore_cancelled: Mutex<HashSet<K, ahash::RandomState>> =
            Mutex::new(HashSet::with_hasher(ahash::RandomState::new()));

        let weight: WeightFn<K, V> = Arc::new(weight);
        let lru_weight = Arc::clone(&weight);

        let demote_slow = Arc::clone(&slow);
        let cancel_slow = Arc::clone(&slow);
        let demote_callbacks = fast_to_slow_callbacks;

        let initial_slow_keys = slow.keys();
        let fast = Lru::with_weight(n, fast, move |k: &K, v: &V| lru_weight(k, v))?
            .with_on_evict(move |key, value| {
                demote_slow.put(key.clone(), value.clone())?;
                for cb in &demote_callbacks {
                    cb(key, value)?;
                }
                Ok(())
            })
            .with_on_cancel_evict(move |key, _value| {
                match cancel_slow.delete(key) {
                    Ok(()) | Err(Error::NotFound) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "cancel-evict cleanup of slow tier failed")
                    }
                };
            });

        let keys = InsertionOrderedSet::from_iter_ordered(
            fast.keys().into_iter().chain(initial_slow_keys),
        );

        Ok(Buffer {
            fast,
            slow,
            weight,
            slow_to_fast_callbacks,
            restoring,
            restore_cancelled,
            keep_slow,
            keys,
        })
    }

    /// True if `key` currently lives in the fast tier.
    pub fn is_fast(&self, key: &K) -> bool {
        self.fast.contains(key)
    }

    /// True if `key` currently lives only in the slow tier.
    pub fn is_slow(&self, key: &K) -> bool {
        self.keys.contains(key) && !self.fast.contains(key)
    }
}

impl<K, V, F, S> Mapping for Buffer<K, V, F, S>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<Key = K, Value = V>,
    S: Mapping<Key = K, Value = V> + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> Result<V> {
        if self.fast.contains(key) {
            return self.fast.get(key);
        }
        if !self.keys.contains(key) {
            return Err(Error::NotFound);
        }

        self.restoring.lock().insert(key.clone());

        let value = self.slow.get(key);

        let was_cancelled = {
            self.restoring.lock().remove(key);
            self.restore_cancelled.lock().remove(key)
        };

        let value = value?;

        if was_cancelled {
            tracing::debug!("restore cancelled by a concurrent writer; serving stale read");
            return Ok(value);
        }

        let w = (self.weight)(key, &value);
        if w <= self.fast.n() {
            self.fast.set_noevict(key.clone(), value.clone())?;
            if !self.keep_slow {
                match self.slow.delete(key) {
                    Ok(()) | Err(Error::NotFound) => {}
                    Err(e) => return Err(e),
                }
            }
        } else {
            tracing::debug!(weight = w, "restored value too heavy for fast tier; left in slow");
        }
        self.fast.evict_until_below_target(self.fast.n())?;

        for cb in &self.slow_to_fast_callbacks {
            cb(key, &value)?;
        }

        Ok(value)
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        self.set_noevict(key, value)?;
        self.fast.evict_until_below_target(self.fast.n())
    }

    fn delete(&self, key: &K) -> Result<()> {
        let removed_from_fast = match self.fast.delete(key) {
            Ok(()) => true,
            Err(Error::NotFound) => false,
            Err(e) => return Err(e),
        };
        let removed_from_slow = match self.slow.delete(key) {
            Ok(()) => true,
            Err(Error::NotFound) => false,
            Err(e) => return Err(e),
        };
        if !removed_from_fast && !removed_from_slow {
            return Err(Error::NotFound);
        }
        self.keys.discard(key);
        if self.restoring.lock().contains(key) {
            self.restore_cancelled.lock().insert(key.clone());
        }
        Ok(())
    }

    fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn keys(&self) -> Vec<K> {
        self.keys.snapshot()
    }

    fn flush(&self) -> Result<()> {
        self.fast.flush()?;
        self.slow.flush()
    }

    fn close(&self) -> Result<()> {
        self.fast.close()?;
        self.slow.close()
    }
}

impl<K, V, F, S> Evicting for Buffer<K, V, F, S>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Mapping<Key = K, Value = V>,
    S: Mapping<Key = K, Value = V> + Send + Sync + 'static,
{
    fn total_weight(&self) -> f64 {
        self.fast.total_weight()
    }

    fn set_noevict(&self, key: K, value: V) -> Result<()> {
        match self.fast.delete(&key) {
            Ok(()) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        match self.slow.delete(&key) {
            Ok(()) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        self.fast.set_noevict(key.clone(), value)?;
        self.keys.insert(key.clone());
        if self.restoring.lock().contains(&key) {
            self.restore_cancelled.lock().insert(key);
        }
        Ok(())
    }

    fn evict(&self) -> Result<(K, V, f64)> {
        self.fast.evict()
    }

    fn evict_key(&self, key: &K) -> Result<(K, V, f64)> {
        self.fast.evict_key(key)
    }

    fn evict_until_below_target(&self, target: f64) -> Result<()> {
        self.fast.evict_until_below_target(target)
    }
}
