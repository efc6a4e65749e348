// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;
use turnstile_adapters::{MemoryBackend, MemoryStore, NoOpBackend, SqliteBackend};
use turnstile_core::{FakeClock, IdStrategy, SequentialIdGen};

fn w(id: &str) -> WorkerId {
    WorkerId::new(id)
}

fn workers(ids: &[&str]) -> Vec<WorkerId> {
    ids.iter().map(|id| WorkerId::new(*id)).collect()
}

async fn memory_lock(store: &MemoryStore, config: &LockConfig) -> DistributedLock<MemoryBackend, FakeClock> {
    let backend = MemoryBackend::new(store.clone(), config.collection.clone()).unwrap();
    let lock = DistributedLock::new(backend, config).with_clock(FakeClock::new());
    lock.connect().await.unwrap();
    lock
}

/// Reserve in order, advancing the clock between reservations
async fn reserve_in_order<B: StorageBackend>(
    lock: &DistributedLock<B, FakeClock>,
    clock: &FakeClock,
    entries: &[(&str, &str)],
) {
    for (worker, aggregate) in entries {
        lock.reserve(&w(worker), aggregate).await.unwrap();
        clock.advance(Duration::from_millis(1));
    }
}

async fn check_fifo_semantics<B: StorageBackend>(lock: DistributedLock<B, FakeClock>, clock: FakeClock) {
    reserve_in_order(&lock, &clock, &[("w1", "a"), ("w2", "a"), ("w3", "a")]).await;
    assert_eq!(lock.get_all("a").await.unwrap(), workers(&["w1", "w2", "w3"]));
    assert!(lock.is_owner(&w("w1"), "a").await.unwrap());
    assert!(!lock.is_owner(&w("w2"), "a").await.unwrap());

    // Moving w1 elsewhere hands the lock to w2
    reserve_in_order(&lock, &clock, &[("w1", "b")]).await;
    assert_eq!(lock.get_all("a").await.unwrap(), workers(&["w2", "w3"]));
    assert_eq!(lock.get_all("b").await.unwrap(), workers(&["w1"]));
    assert!(lock.is_owner(&w("w2"), "a").await.unwrap());

    lock.resolve("a").await.unwrap();
    assert!(lock.get_all("a").await.unwrap().is_empty());
    assert_eq!(lock.get_all("b").await.unwrap(), workers(&["w1"]));

    lock.clear().await.unwrap();
    assert!(lock.get_all("b").await.unwrap().is_empty());
}

#[tokio::test]
async fn fifo_semantics_over_memory_store() {
    let clock = FakeClock::new();
    let store = MemoryStore::new();
    let backend = MemoryBackend::new(store, "aggregatelock").unwrap();
    let lock = DistributedLock::new(backend, &LockConfig::new()).with_clock(clock.clone());
    lock.connect().await.unwrap();

    check_fifo_semantics(lock, clock).await;
}

#[tokio::test]
async fn fifo_semantics_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let backend = SqliteBackend::new(dir.path().join("locks.db"), "aggregatelock").unwrap();
    let lock = DistributedLock::new(backend, &LockConfig::new()).with_clock(clock.clone());
    lock.connect().await.unwrap();

    check_fifo_semantics(lock, clock).await;
}

#[tokio::test]
async fn workers_sharing_a_store_see_one_queue() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    let config = LockConfig::new();
    let backend = || MemoryBackend::new(store.clone(), "aggregatelock").unwrap();
    let first = DistributedLock::new(backend(), &config).with_clock(clock.clone());
    let second = DistributedLock::new(backend(), &config).with_clock(clock.clone());
    first.connect().await.unwrap();
    second.connect().await.unwrap();

    first.reserve(&w("w1"), "agg").await.unwrap();
    clock.advance(Duration::from_millis(5));
    second.reserve(&w("w2"), "agg").await.unwrap();

    assert_eq!(second.get_all("agg").await.unwrap(), workers(&["w1", "w2"]));
    assert!(first.is_owner(&w("w1"), "agg").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_keep_one_per_worker() {
    let store = MemoryStore::new();
    let lock = memory_lock(&store, &LockConfig::new()).await;

    let mut handles = Vec::new();
    for i in 0..32 {
        let lock = lock.clone();
        handles.push(tokio::spawn(async move {
            let worker = w(&format!("w{}", i % 8));
            let aggregate = format!("agg{}", i % 3);
            lock.reserve(&worker, &aggregate).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut seen = Vec::new();
    for aggregate in ["agg0", "agg1", "agg2"] {
        seen.extend(lock.get_all(aggregate).await.unwrap());
    }
    let unique: HashSet<_> = seen.iter().cloned().collect();
    assert_eq!(seen.len(), 8);
    assert_eq!(unique.len(), 8);
}

#[tokio::test]
async fn operations_fail_fast_while_disconnected() {
    let store = MemoryStore::new();
    let backend = MemoryBackend::new(store.clone(), "aggregatelock").unwrap();
    let lock = DistributedLock::new(backend, &LockConfig::new());

    assert!(matches!(
        lock.reserve(&w("w1"), "a").await,
        Err(StoreError::Unavailable)
    ));
    assert!(matches!(lock.get_all("a").await, Err(StoreError::Unavailable)));
    assert!(matches!(lock.resolve("a").await, Err(StoreError::Unavailable)));
    assert!(matches!(lock.clear().await, Err(StoreError::Unavailable)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn storage_errors_propagate_unchanged() {
    let store = MemoryStore::new();
    let lock = memory_lock(&store, &LockConfig::new()).await;

    let conn = lock.supervisor().connection().unwrap();
    conn.close().await.unwrap();

    let err = lock.get_all("a").await.unwrap_err();
    assert!(matches!(err, StoreError::Connection { backend: "memory", .. }));
}

// =============================================================================
// Identifiers
// =============================================================================

#[tokio::test]
async fn uuid_ids_are_distinct_and_need_no_connection() {
    let store = MemoryStore::new();
    let backend = MemoryBackend::new(store.clone(), "aggregatelock").unwrap();
    let lock = DistributedLock::new(backend, &LockConfig::new());

    let mut ids = HashSet::new();
    for _ in 0..100 {
        ids.insert(lock.get_new_id().await.unwrap());
    }
    assert_eq!(ids.len(), 100);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn counter_ids_are_shared_across_workers() {
    let store = MemoryStore::new();
    let config = LockConfig::new().with_id_strategy(IdStrategy::Counter);
    let first = memory_lock(&store, &config).await;
    let second = memory_lock(&store, &config).await;

    assert_eq!(first.get_new_id().await.unwrap(), "1");
    assert_eq!(second.get_new_id().await.unwrap(), "2");
    assert_eq!(first.get_new_id().await.unwrap(), "3");

    first.clear().await.unwrap();
    assert_eq!(second.get_new_id().await.unwrap(), "1");
}

#[tokio::test]
async fn counter_ids_need_a_connection() {
    let store = MemoryStore::new();
    let config = LockConfig::new().with_id_strategy(IdStrategy::Counter);
    let backend = MemoryBackend::new(store, "aggregatelock").unwrap();
    let lock = DistributedLock::new(backend, &config);

    assert!(matches!(lock.get_new_id().await, Err(StoreError::Unavailable)));
}

#[tokio::test]
async fn custom_id_generator_replaces_strategy() {
    let store = MemoryStore::new();
    let backend = MemoryBackend::new(store, "aggregatelock").unwrap();
    let lock = DistributedLock::new(backend, &LockConfig::new().with_id_strategy(IdStrategy::Counter))
        .with_id_gen(SequentialIdGen::new("lock"));

    assert_eq!(lock.get_new_id().await.unwrap(), "lock-1");
    assert_eq!(lock.get_new_id().await.unwrap(), "lock-2");
}

#[tokio::test]
async fn noop_backend_makes_reserver_owner_with_distinct_ids() {
    let config = LockConfig::new().with_id_strategy(IdStrategy::Counter);
    let lock = DistributedLock::new(NoOpBackend::new(), &config);
    lock.connect().await.unwrap();

    let first = lock.get_new_id().await.unwrap();
    let second = lock.get_new_id().await.unwrap();
    assert_ne!(first, second);

    lock.reserve(&w("w1"), "agg").await.unwrap();
    assert_eq!(lock.get_all("agg").await.unwrap(), workers(&["w1"]));
    assert!(lock.is_owner(&w("w1"), "agg").await.unwrap());
}

// =============================================================================
// Property tests
// =============================================================================

proptest! {
    #[test]
    fn queues_follow_latest_reservation_order(
        ops in prop::collection::vec((0usize..5, 0usize..3), 1..40)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let clock = FakeClock::new();
            let backend = MemoryBackend::new(MemoryStore::new(), "aggregatelock").unwrap();
            let lock = DistributedLock::new(backend, &LockConfig::new()).with_clock(clock.clone());
            lock.connect().await.unwrap();

            // Model: each worker's latest (aggregate, sequence)
            let mut latest: Vec<Option<(usize, usize)>> = vec![None; 5];
            for (seq, (worker, aggregate)) in ops.iter().enumerate() {
                lock.reserve(&w(&format!("w{}", worker)), &format!("a{}", aggregate))
                    .await
                    .unwrap();
                latest[*worker] = Some((*aggregate, seq));
                clock.advance(Duration::from_millis(1));
            }

            for aggregate in 0..3 {
                let mut expected: Vec<(usize, usize)> = latest
                    .iter()
                    .enumerate()
                    .filter_map(|(worker, entry)| match entry {
                        Some((a, seq)) if *a == aggregate => Some((*seq, worker)),
                        _ => None,
                    })
                    .collect();
                expected.sort();
                let expected: Vec<WorkerId> = expected
                    .into_iter()
                    .map(|(_, worker)| w(&format!("w{}", worker)))
                    .collect();

                let actual = lock.get_all(&format!("a{}", aggregate)).await.unwrap();
                assert_eq!(actual, expected);
            }
        });
    }
}
