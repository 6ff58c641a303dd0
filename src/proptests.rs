use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, HashSet};

fn validate_table(t: &SparseMemoryTable) {
    let mut reachable = 0usize;
    let mut seen = HashSet::new();
    for (idx, bucket) in t.buckets.iter().enumerate() {
        for cell in bucket.cells() {
            assert_eq!(
                t.bucket_of(cell.location()),
                idx,
                "cell {} reachable from the wrong bucket",
                cell.location()
            );
            assert!(
                seen.insert(cell.location()),
                "location {} materialized twice",
                cell.location()
            );
            reachable += 1;
        }
    }
    assert_eq!(reachable, t.len(), "reachable cell count must match len");
    assert!(t.verify().is_ok());
}

fn table_matches(t: &SparseMemoryTable, m: &BTreeMap<u64, u32>) {
    for (&loc, &value) in m {
        assert_eq!(t.get(loc), Some(value), "location {loc}");
    }
}

// Small location space so chains grow long and operations collide. A few
// locations near the top of the address space keep the modulus honest.
fn location_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        9 => 0u64..256,
        1 => (u64::MAX - 64)..=u64::MAX,
    ]
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 8)]
    Insert(
        #[proptest(strategy = "location_strategy()")] u64,
        #[proptest(strategy = "0u32..4")] u32,
    ),
    #[proptest(weight = 4)]
    Remove(#[proptest(strategy = "location_strategy()")] u64),
    #[proptest(weight = 4)]
    Lookup(#[proptest(strategy = "location_strategy()")] u64),
    #[proptest(weight = 2)]
    Take(#[proptest(strategy = "location_strategy()")] u64),
    #[proptest(weight = 1)]
    EnsureRange(
        #[proptest(strategy = "location_strategy()")] u64,
        #[proptest(strategy = "0u64..16")] u64,
    ),
    #[proptest(weight = 1)]
    Teardown,
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_btreemap(ops in prop::collection::vec(any::<Op>(), 0..=1500)) {
        let mut t = SparseMemoryTable::new();
        let mut m: BTreeMap<u64, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(loc, value) => {
                    let cell = t.insert(loc, value);
                    prop_assert_eq!(cell.location(), loc);
                    prop_assert_eq!(cell.value(), value);
                    m.insert(loc, value);
                }
                Op::Remove(loc) => {
                    let got = t.remove(loc);
                    match m.remove(&loc) {
                        Some(value) => {
                            prop_assert_eq!(got.ok(), Some(value));
                        }
                        None => {
                            let is_not_found = matches!(got, Err(Error::NotFound { location }) if location == loc);
                            prop_assert!(is_not_found);
                        }
                    }
                    prop_assert_eq!(t.lookup(loc), 0);
                }
                Op::Lookup(loc) => {
                    prop_assert_eq!(t.lookup(loc), m.get(&loc).copied().unwrap_or(0));
                    prop_assert_eq!(t.get(loc), m.get(&loc).copied());
                }
                Op::Take(loc) => {
                    let expected = m.get_mut(&loc).map_or(0, |v| std::mem::replace(v, 0));
                    prop_assert_eq!(t.take(loc), expected);
                }
                Op::EnsureRange(loc, len) => {
                    let mut created = 0;
                    for offset in 0..len {
                        let at = loc.wrapping_add(offset);
                        if m.get(&at).copied().unwrap_or(0) == 0 && m.insert(at, 0).is_none() {
                            created += 1;
                        }
                    }
                    prop_assert_eq!(t.ensure_range(loc, len), created);
                }
                Op::Teardown => {
                    prop_assert_eq!(t.teardown(), m.len());
                    m.clear();
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_table(&t);
        table_matches(&t, &m);
    }

    #[test]
    fn prop_insert_then_lookup(loc in any::<u64>(), value in any::<u32>()) {
        let mut t = SparseMemoryTable::new();
        prop_assert_eq!(t.lookup(loc), 0);
        t.insert(loc, value);
        prop_assert_eq!(t.lookup(loc), value);
        prop_assert_eq!(t.remove(loc).ok(), Some(value));
        prop_assert_eq!(t.lookup(loc), 0);
        prop_assert!(t.is_empty());
    }

    #[test]
    fn prop_dump_range_matches_lookups(
        cells in prop::collection::vec((0u64..64, any::<u32>()), 0..32),
        start in 0u64..64,
        len in 0u64..32,
    ) {
        let mut t = SparseMemoryTable::new();
        for &(loc, value) in &cells {
            t.insert(loc, value);
        }
        let before = t.len();
        let expected: String = (start..start + len)
            .map(|l| format!("{} ", t.lookup(l)))
            .chain(std::iter::once("\n".to_string()))
            .collect();
        prop_assert_eq!(t.dump_range(start, len), expected);
        prop_assert_eq!(t.len(), before);
    }
}

/// Calls `f` once with every ordering of `items` (Heap's algorithm).
fn for_each_ordering<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    let mut order = items.to_vec();
    let mut swaps = vec![0usize; order.len()];
    f(order.clone());

    let mut level = 1;
    while level < order.len() {
        if swaps[level] < level {
            let other = if level % 2 == 0 { 0 } else { swaps[level] };
            order.swap(other, level);
            f(order.clone());
            swaps[level] += 1;
            level = 1;
        } else {
            swaps[level] = 0;
            level += 1;
        }
    }
}

#[test]
fn orderings_are_distinct_and_complete() {
    let mut seen = HashSet::new();
    for_each_ordering(&[1u8, 2, 3, 4], |order| {
        assert!(seen.insert(order), "ordering visited twice");
    });
    assert_eq!(seen.len(), 24);

    let mut calls = 0;
    for_each_ordering::<u8>(&[], |order| {
        assert!(order.is_empty());
        calls += 1;
    });
    assert_eq!(calls, 1);
}

// Every location shares bucket 5, so each removal order exercises head,
// interior, tail and sole-cell unlinking.
const SAME_BUCKET: [u64; 6] = [5, 37, 69, 101, 133, 165];

#[test]
fn exhaustive_insert_order_single_bucket() {
    for_each_ordering(&SAME_BUCKET, |order| {
        let mut t = SparseMemoryTable::new();
        for (i, &loc) in order.iter().enumerate() {
            t.insert(loc, i as u32 + 1);
        }
        validate_table(&t);
        assert_eq!(t.stats().longest_chain, SAME_BUCKET.len());

        let chain: Vec<u64> = t.buckets[5].cells().map(|c| c.location()).collect();
        assert_eq!(chain, order, "cells are appended at the tail");
    });
}

#[test]
fn exhaustive_remove_order_single_bucket() {
    let mut base = SparseMemoryTable::new();
    for &loc in &SAME_BUCKET {
        base.insert(loc, loc as u32);
    }

    for_each_ordering(&SAME_BUCKET, |order| {
        let mut t = base.clone();
        let mut remaining = SAME_BUCKET.len();

        for loc in order {
            assert_eq!(t.remove(loc).unwrap(), loc as u32);
            remaining -= 1;
            assert_eq!(t.len(), remaining);
            validate_table(&t);
            assert!(matches!(t.remove(loc), Err(Error::NotFound { .. })));
        }
        assert!(t.is_empty());
        assert!(t.buckets[5].is_empty());
    });
}
