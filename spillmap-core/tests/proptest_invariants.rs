//! Property tests over random operation sequences, checking the
//! invariants that must hold for any sequence of `put`/`get`/`delete`
//! calls: the live key set always matches what `d` itself reports, and
//! `total_weight` always equals the sum of recorded per-key weights.

use proptest::prelude::*;

use spillmap_core::lru::Lru;
use spillmap_core::mapping::{Evicting, Mapping, MemoryLeaf};

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u8),
    Delete(u8),
    Get(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<u8>(), any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
        any::<u8>().prop_map(Op::Delete),
        any::<u8>().prop_map(Op::Get),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn total_weight_matches_sum_of_live_entries(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let lru: Lru<u8, u8, _> = Lru::new(8.0, MemoryLeaf::new()).unwrap();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    let _ = lru.put(k, v);
                }
                Op::Delete(k) => {
                    let _ = lru.delete(&k);
                }
                Op::Get(k) => {
                    let _ = lru.get(&k);
                }
            }

            let keys = lru.keys();
            let expected_total: f64 = keys.len() as f64; // constant weight 1 per entry
            prop_assert_eq!(lru.total_weight(), expected_total);
            prop_assert_eq!(keys.len(), lru.len());
            prop_assert!(lru.total_weight() <= 8.0 + 1e-9);

            for k in &keys {
                prop_assert!(lru.contains(k));
                prop_assert!(lru.get(k).is_ok());
            }
        }
    }

    #[test]
    fn recency_order_has_no_duplicates_and_matches_live_set(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let lru: Lru<u8, u8, _> = Lru::new(5.0, MemoryLeaf::new()).unwrap();

        for op in ops {
            match op {
                Op::Put(k, v) => { let _ = lru.put(k, v); }
                Op::Delete(k) => { let _ = lru.delete(&k); }
                Op::Get(k) => { let _ = lru.get(&k); }
            }
        }

        let keys = lru.keys();
        let unique: std::collections::HashSet<_> = keys.iter().copied().collect();
        prop_assert_eq!(keys.len(), unique.len());
        prop_assert!(keys.len() <= 5);
    }
}
