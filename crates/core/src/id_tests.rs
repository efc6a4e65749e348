// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::collections::HashSet;

#[test]
fn uuid_gen_creates_unique_ids() {
    let id_gen = UuidIdGen;
    let id1 = id_gen.next();
    let id2 = id_gen.next();
    assert_ne!(id1, id2);
    assert_eq!(id1.len(), 32); // simple UUID format, no hyphens
}

#[test]
fn sequential_gen_creates_predictable_ids() {
    let id_gen = SequentialIdGen::new("worker");
    assert_eq!(id_gen.next(), "worker-1");
    assert_eq!(id_gen.next(), "worker-2");
    assert_eq!(id_gen.next(), "worker-3");
}

#[test]
fn sequential_gen_is_cloneable_and_shared() {
    let id_gen1 = SequentialIdGen::new("shared");
    let id_gen2 = id_gen1.clone();
    assert_eq!(id_gen1.next(), "shared-1");
    assert_eq!(id_gen2.next(), "shared-2");
    assert_eq!(id_gen1.next(), "shared-3");
}

#[test]
fn uuid_gen_is_unique_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| (0..250).map(|_| UuidIdGen.next()).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "duplicate id generated");
        }
    }
    assert_eq!(seen.len(), 2000);
}

proptest! {
    #[test]
    fn sequential_gen_never_repeats(count in 1usize..200) {
        let id_gen = SequentialIdGen::default();
        let ids: HashSet<String> = (0..count).map(|_| id_gen.next()).collect();
        prop_assert_eq!(ids.len(), count);
    }
}
