//! # Lru/Buffer Benchmark Harness
//!
//! Purpose: a dependency-free, repeatable benchmark driver for `Lru` and
//! `Buffer` so baseline throughput can be compared over time.
//!
//! ## Design Principles
//! 1. **Deterministic workload**: a fixed PRNG seed for stable comparisons.
//! 2. **Allocation control**: pre-build keys/values to keep setup costs off
//!    the hot path.
//! 3. **Zero-cost dispatch**: call the concrete types directly, no `dyn
//!    Mapping`.

use std::env;
use std::hint::black_box;
use std::time::Instant;

use spillmap_core::buffer::Buffer;
use spillmap_core::lru::Lru;
use spillmap_core::mapping::{Mapping, MemoryLeaf};

const DEFAULT_KEY_COUNT: usize = 1 << 14;
const DEFAULT_OP_COUNT: usize = 1_000_000;
const DEFAULT_CAPACITY_FRACTION: usize = 4;

struct BenchConfig {
    requested_keys: usize,
    key_count: usize,
    key_mask: usize,
    op_count: usize,
    capacity: f64,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let capacity_fraction = parse_usize(args.next(), DEFAULT_CAPACITY_FRACTION).max(1);

        let key_count = normalize_power_of_two(requested_keys);
        let key_mask = key_count - 1;
        let capacity = (key_count / capacity_fraction).max(1) as f64;

        BenchConfig {
            requested_keys,
            key_count,
            key_mask,
            op_count,
            capacity,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn normalize_power_of_two(value: usize) -> usize {
    let value = value.max(1);
    if value.is_power_of_two() {
        value
    } else {
        value.next_power_of_two()
    }
}

/// Tiny deterministic PRNG used to avoid external dependencies.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn build_keys(count: usize) -> Vec<u64> {
    (0..count as u64).collect()
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn bench_lru(config: &BenchConfig) {
    let lru: Lru<u64, u64, MemoryLeaf<u64, u64>> =
        Lru::new(config.capacity, MemoryLeaf::new()).expect("construction cannot fail for an empty leaf");
    let keys = build_keys(config.key_count);

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        lru.put(keys[idx], keys[idx]).expect("put");
    }
    report("Lru PUT (evicting)", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    let mut hits = 0usize;
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        if let Ok(value) = lru.get(&keys[idx]) {
            hits += 1;
            black_box(value);
        }
    }
    report("Lru GET", config.op_count, start.elapsed());
    println!(
        "Lru GET hit rate: {:.2}% (capacity {} / {} keys)",
        100.0 * hits as f64 / config.op_count as f64,
        config.capacity,
        config.key_count
    );
}

fn bench_buffer(config: &BenchConfig) {
    let buffer: Buffer<u64, u64, MemoryLeaf<u64, u64>, MemoryLeaf<u64, u64>> =
        Buffer::new(MemoryLeaf::new(), MemoryLeaf::new(), config.capacity)
            .expect("construction cannot fail for empty leaves");
    let keys = build_keys(config.key_count);

    let mut rng = XorShift64::new(0xA5A5_A5A5_A5A5_A5A5);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        buffer.put(keys[idx], keys[idx]).expect("put");
    }
    report("Buffer PUT (spilling)", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x5A5A_5A5A_5A5A_5A5A);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        if let Ok(value) = buffer.get(&keys[idx]) {
            black_box(value);
        }
    }
    report("Buffer GET (restoring)", config.op_count, start.elapsed());
}

fn main() {
    let config = BenchConfig::from_args();
    println!(
        "keys: requested={}, actual={}, ops={}, capacity={}",
        config.requested_keys, config.key_count, config.op_count, config.capacity
    );
    bench_lru(&config);
    bench_buffer(&config);
}
