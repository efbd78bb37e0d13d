//! # Weighted LRU
//!
//! A recency-ordered view over a wrapped [`Mapping`], enforcing a soft
//! total-weight bound and invoking eviction callbacks in order.
//!
//! ## Design Principles
//!
//! 1. **Insertion-ordered recency**: the recency order and the heavy-key
//!    subset are both `IndexSet`s; a "touch" is `discard`-then-`insert`,
//!    never a direct reinsertion at the old position, so a key raced away
//!    by a concurrent eviction is silently not resurrected.
//! 2. **Heavy-first eviction**: a key whose own weight exceeds `n` is
//!    evicted before any merely-old key — one oversized entry must not be
//!    allowed to displace many useful ones on every access.
//! 3. **Exception-safe eviction**: a victim is only removed from `d` and
//!    from every index *after* every `on_evict` callback has returned
//!    `Ok`. Nothing is mutated on the failure path, so "the victim remains
//!    fully in place" falls out of the ordering rather than needing an
//!    explicit rollback.
//! 4. **Lock scoping, not reentrancy**: the internal `parking_lot::Mutex`
//!    is never held across a callback invocation or a call into `d`. See
//!    `SPEC_FULL.md` §6 for why this stands in for the source's reentrant
//!    lock.
//!
//! ## Structure Overview
//!
//! ```text
//! Lru<K, V, D>
//!   ├── d: D                        (wrapped Mapping; source of truth for keys/values)
//!   ├── state: Mutex<LruState<K>>
//!   │     ├── order: IndexSet<K>    (recency order, front = oldest)
//!   │     ├── heavy: IndexSet<K>    (subset of order with weight > n)
//!   │     ├── weights: HashMap<K, f64>
//!   │     ├── evicting: HashSet<K>  (keys with an in-flight evict_key call)
//!   │     └── cancelled: HashSet<K> (keys whose in-flight eviction should be undone)
//!   └── total_weight: Accumulator   (lock-free running total)
//! ```

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::accumulator::Accumulator;
use crate::error::{Error, Result};
use crate::mapping::{Evicting, Mapping};

type Callback<K, V> = Arc<dyn Fn(&K, &V) -> Result<()> + Send + Sync>;
type CancelCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;
type WeightFn<K, V> = Arc<dyn Fn(&K, &V) -> f64 + Send + Sync>;

struct LruState<K> {
    order: indexmap::IndexSet<K, ahash::RandomState>,
    heavy: indexmap::IndexSet<K, ahash::RandomState>,
    weights: HashMap<K, f64, ahash::RandomState>,
    evicting: HashSet<K, ahash::RandomState>,
    cancelled: HashSet<K, ahash::RandomState>,
}

impl<K> LruState<K>
where
    K: Eq + Hash,
{
    fn new() -> Self {
        LruState {
            order: indexmap::IndexSet::with_hasher(ahash::RandomState::new()),
            heavy: indexmap::IndexSet::with_hasher(ahash::RandomState::new()),
            weights: HashMap::with_hasher(ahash::RandomState::new()),
            evicting: HashSet::with_hasher(ahash::RandomState::new()),
            cancelled: HashSet::with_hasher(ahash::RandomState::new()),
        }
    }
}

/// Evict Least-Recently-Used elements once the wrapped mapping's total
/// weight exceeds `n`.
///
/// See the module documentation for the structure, and spec.md §4.1 for
/// the full contract this type implements.
pub struct Lru<K, V, D> {
    d: D,
    n: f64,
    weight: WeightFn<K, V>,
    on_evict: Vec<Callback<K, V>>,
    on_cancel_evict: Vec<CancelCallback<K, V>>,
    state: Mutex<LruState<K>>,
    total_weight: Accumulator,
    offset: Accumulator,
    closed: AtomicBool,
}

impl<K, V, D> Lru<K, V, D>
where
    K: Eq + Hash + Clone,
    V: Clone,
    D: Mapping<Key = K, Value = V>,
{
    /// Creates an LRU with a constant weight of 1 per entry — `n` is then
    /// simply a maximum entry count.
    pub fn new(n: f64, d: D) -> Result<Self> {
        Self::with_weight(n, d, |_, _| 1.0)
    }

    /// Creates an LRU with a custom weight function. If `d` is
    /// pre-populated, the initial recency order follows `d.keys()`, and
    /// weights/heavy-set membership are computed for every existing entry
    /// up front — no eviction runs during construction, even if the
    /// initial total exceeds `n`.
    pub fn with_weight<F>(n: f64, d: D, weight: F) -> Result<Self>
    where
        F: Fn(&K, &V) -> f64 + Send + Sync + 'static,
    {
        let weight: WeightFn<K, V> = Arc::new(weight);
        let mut state = LruState::new();
        let mut total = 0.0;
        for key in d.keys() {
            let value = d.get(&key)?;
            let w = weight(&key, &value);
            state.order.insert(key.clone());
            if w > n {
                state.heavy.insert(key.clone());
            }
            state.weights.insert(key, w);
            total += w;
        }
        Ok(Lru {
            d,
            n,
            weight,
            on_evict: Vec::new(),
            on_cancel_evict: Vec::new(),
            state: Mutex::new(state),
            total_weight: Accumulator::new(total),
            offset: Accumulator::new(0.0),
            closed: AtomicBool::new(false),
        })
    }

    /// Sets the initial external-accounting offset (see [`Lru::add_offset`]).
    pub fn with_offset(self, initial: f64) -> Self {
        self.offset.add(initial);
        self
    }

    /// Registers a callback run (in registration order) before a victim is
    /// committed for removal. An `Err` from any callback aborts the
    /// eviction and leaves the victim untouched.
    pub fn with_on_evict<F>(mut self, cb: F) -> Self
    where
        F: Fn(&K, &V) -> Result<()> + Send + Sync + 'static,
    {
        self.on_evict.push(Arc::new(cb));
        self
    }

    /// Registers a callback run when a concurrent `set_noevict`/`delete`
    /// raced an in-flight eviction of the same key to completion first.
    /// Used by [`crate::buffer::Buffer`] to undo a partial fast→slow
    /// write.
    pub fn with_on_cancel_evict<F>(mut self, cb: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.on_cancel_evict.push(Arc::new(cb));
        self
    }

    /// The configured weight bound.
    pub fn n(&self) -> f64 {
        self.n
    }

    /// The weight recorded for `key` at insertion time, if present.
    pub fn weight_of(&self, key: &K) -> Option<f64> {
        self.state.lock().weights.get(key).copied()
    }

    /// True if `key` is in the heavy set (its recorded weight exceeds `n`).
    pub fn is_heavy(&self, key: &K) -> bool {
        self.state.lock().heavy.contains(key)
    }

    /// True once `close()` has been called; `evict_until_below_target`
    /// stops between evictions (not mid-callback) once this is set.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The current external-accounting offset, added to `total_weight`
    /// when checking against `n`.
    pub fn offset(&self) -> f64 {
        self.offset.get()
    }

    /// Overwrites the external-accounting offset.
    pub fn set_offset(&self, value: f64) {
        self.offset.set(value)
    }

    /// Adds `delta` (may be negative) to the external-accounting offset
    /// and returns the new value.
    pub fn add_offset(&self, delta: f64) -> f64 {
        self.offset.add(delta)
    }

    fn select_victim(&self) -> Option<K> {
        let state = self.state.lock();
        state
            .heavy
            .get_index(0)
            .or_else(|| state.order.get_index(0))
            .cloned()
    }

    /// Moves `key` to the oldest end of the recency order. Used only by
    /// the heavy-key recovery path in `put`: repositioning does not change
    /// victim selection while `key` stays in the heavy set (heavy-first
    /// always wins), but gives lighter keys priority on a later attempt if
    /// `key` ever leaves the heavy set.
    fn move_to_oldest(&self, key: &K) {
        let mut state = self.state.lock();
        if state.order.shift_remove(key) {
            let rest: Vec<K> = state.order.drain(..).collect();
            state.order.insert(key.clone());
            for k in rest {
                state.order.insert(k);
            }
        }
    }
}

impl<K, V, D> Mapping for Lru<K, V, D>
where
    K: Eq + Hash + Clone,
    V: Clone,
    D: Mapping<Key = K, Value = V>,
{
    type Key = K;
    type Value = V;

    fn get(&self, key: &K) -> Result<V> {
        let value = self.d.get(key)?;
        let mut state = self.state.lock();
        if state.order.shift_remove(key) {
            state.order.insert(key.clone());
        }
        if state.heavy.shift_remove(key) {
            state.heavy.insert(key.clone());
        }
        Ok(value)
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        let weight = (self.weight)(&key, &value);
        self.set_noevict(key.clone(), value)?;
        match self.evict_until_below_target(self.n) {
            Ok(()) => Ok(()),
            Err(e) if weight > self.n && e.is_callback_or_backing() => {
                self.move_to_oldest(&key);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn delete(&self, key: &K) -> Result<()> {
        self.d.delete(key)?;
        let weight = {
            let mut state = self.state.lock();
            state.order.shift_remove(key);
            state.heavy.shift_remove(key);
            state.weights.remove(key)
        };
        if let Some(w) = weight {
            self.total_weight.add(-w);
        }
        Ok(())
    }

    fn contains(&self, key: &K) -> bool {
        self.d.contains(key)
    }

    fn len(&self) -> usize {
        self.d.len()
    }

    fn keys(&self) -> Vec<K> {
        self.state.lock().order.iter().cloned().collect()
    }

    fn flush(&self) -> Result<()> {
        self.d.flush()
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.d.close()
    }
}

impl<K, V, D> Evicting for Lru<K, V, D>
where
    K: Eq + Hash + Clone,
    V: Clone,
    D: Mapping<Key = K, Value = V>,
{
    fn total_weight(&self) -> f64 {
        self.total_weight.get()
    }

    fn set_noevict(&self, key: K, value: V) -> Result<()> {
        match self.delete(&key) {
            Ok(()) | Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        let weight = (self.weight)(&key, &value);
        self.d.put(key.clone(), value)?;
        {
            let mut state = self.state.lock();
            state.order.insert(key.clone());
            if weight > self.n {
                state.heavy.insert(key.clone());
            }
            state.weights.insert(key.clone(), weight);
            if state.evicting.contains(&key) {
                state.cancelled.insert(key);
            }
        }
        self.total_weight.add(weight);
        Ok(())
    }

    fn evict(&self) -> Result<(K, V, f64)> {
        let key = self.select_victim().ok_or(Error::Empty)?;
        self.evict_key(&key)
    }

    fn evict_key(&self, key: &K) -> Result<(K, V, f64)> {
        let value = self.d.get(key)?;
        let weight = {
            let mut state = self.state.lock();
            let w = *state.weights.get(key).ok_or(Error::NotFound)?;
            state.evicting.insert(key.clone());
            w
        };

        let cb_result: Result<()> = (|| {
            for cb in &self.on_evict {
                cb(key, &value)?;
            }
            Ok(())
        })();

        let was_cancelled = {
            let mut state = self.state.lock();
            state.evicting.remove(key);
            state.cancelled.remove(key)
        };

        cb_result?;

        if was_cancelled {
            tracing::debug!("eviction cancelled by a concurrent writer; undoing side effects");
            for cb in &self.on_cancel_evict {
                cb(key, &value);
            }
            return Err(Error::NotFound);
        }

        self.d.delete(key)?;
        {
            let mut state = self.state.lock();
            state.order.shift_remove(key);
            state.heavy.shift_remove(key);
            state.weights.remove(key);
        }
        self.total_weight.add(-weight);
        tracing::debug!(weight, "evicted victim");

        Ok((key.clone(), value, weight))
    }

    fn evict_until_below_target(&self, target: f64) -> Result<()> {
        while self.total_weight.get() + self.offset.get() > target && !self.is_empty() && !self.is_closed() {
            match self.evict() {
                Ok(_) => {}
                Err(Error::NotFound) | Err(Error::Empty) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
