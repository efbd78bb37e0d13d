//! Thread-safe cumulative weight counter.
//!
//! Mirrors the atomic-counter pattern used for server-side metrics
//! (`requests_total`, `inflight`, ...): a plain `AtomicU64` updated with
//! `Ordering::Relaxed`, snapshot-on-read, no locking. The one twist is that
//! `total_weight` is a non-negative `f64` (spec weights are arbitrary real
//! numbers), so the counter stores the bit pattern of the `f64` and updates
//! it through a compare-and-swap retry loop rather than a native integer
//! add.

use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free running total, used by [`crate::lru::Lru`] for
/// `total_weight`.
///
/// Reads never block writers and never block each other; a `get()` that
/// races a concurrent `add()` simply observes the value before or after,
/// never a torn intermediate state (the whole `f64` moves atomically via
/// its bit pattern).
#[derive(Debug, Default)]
pub struct Accumulator {
    bits: AtomicU64,
}

impl Accumulator {
    /// Creates an accumulator starting at `initial`.
    pub fn new(initial: f64) -> Self {
        Accumulator {
            bits: AtomicU64::new(initial.to_bits()),
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Adds `delta` (may be negative) and returns the new value.
    ///
    /// Implemented as a CAS retry loop since there is no native atomic
    /// float add; contention is expected to be low (one add per
    /// set/delete/evict, not per read).
    pub fn add(&self, delta: f64) -> f64 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let new_value = f64::from_bits(current) + delta;
            let new_bits = new_value.to_bits();
            match self.bits.compare_exchange_weak(
                current,
                new_bits,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return new_value,
                Err(observed) => current = observed,
            }
        }
    }

    /// Overwrites the value unconditionally.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial() {
        let acc = Accumulator::new(3.5);
        assert_eq!(acc.get(), 3.5);
    }

    #[test]
    fn add_accumulates() {
        let acc = Accumulator::new(0.0);
        assert_eq!(acc.add(2.0), 2.0);
        assert_eq!(acc.add(-0.5), 1.5);
        assert_eq!(acc.get(), 1.5);
    }

    #[test]
    fn concurrent_add_sums_exactly() {
        use std::sync::Arc;
        use std::thread;

        let acc = Arc::new(Accumulator::new(0.0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let acc = Arc::clone(&acc);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        acc.add(1.0);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(acc.get(), 8000.0);
    }
}
