// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op backend for when coordination is disabled.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turnstile_core::{Reservation, StorageBackend, StorageConnection, StoreError, WorkerId};

#[derive(Debug, Default)]
struct Heads {
    /// aggregate -> latest worker to reserve it
    by_aggregate: HashMap<String, WorkerId>,
}

/// Backend that coordinates nothing.
///
/// Every dedup insert succeeds and a queue only ever holds the worker that
/// reserved it last, so each reserving worker is immediately at the head.
/// Counter ids are unique within the process. Clones share that state.
#[derive(Clone, Debug, Default)]
pub struct NoOpBackend {
    heads: Arc<Mutex<Heads>>,
    counter: Arc<AtomicU64>,
}

impl NoOpBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for NoOpBackend {
    type Connection = NoOpConnection;

    fn name(&self) -> &'static str {
        "noop"
    }

    fn collection(&self) -> &str {
        "noop"
    }

    async fn connect(&self) -> Result<NoOpConnection, StoreError> {
        Ok(NoOpConnection {
            heads: Arc::clone(&self.heads),
            counter: Arc::clone(&self.counter),
        })
    }
}

#[derive(Clone, Debug)]
pub struct NoOpConnection {
    heads: Arc<Mutex<Heads>>,
    counter: Arc<AtomicU64>,
}

impl NoOpConnection {
    fn with_heads<T>(&self, f: impl FnOnce(&mut Heads) -> T) -> T {
        let mut heads = self.heads.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut heads)
    }
}

#[async_trait]
impl StorageConnection for NoOpConnection {
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn closed(&self) {
        std::future::pending::<()>().await
    }

    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        self.with_heads(|h| {
            h.by_aggregate
                .retain(|_, worker| worker != &reservation.worker_id);
            h.by_aggregate.insert(
                reservation.aggregate_id.clone(),
                reservation.worker_id.clone(),
            );
        });
        Ok(())
    }

    async fn list_reservations(&self, aggregate_id: &str) -> Result<Vec<WorkerId>, StoreError> {
        Ok(self.with_heads(|h| h.by_aggregate.get(aggregate_id).cloned().into_iter().collect()))
    }

    async fn delete_reservations(&self, aggregate_id: &str) -> Result<(), StoreError> {
        self.with_heads(|h| h.by_aggregate.remove(aggregate_id));
        Ok(())
    }

    async fn delete_all_reservations(&self) -> Result<(), StoreError> {
        self.with_heads(|h| h.by_aggregate.clear());
        Ok(())
    }

    async fn insert_if_absent_with_expiry(
        &self,
        _key: &str,
        _ttl: Duration,
    ) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn delete_expired_dedup_entry(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete_all_dedup_entries(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn increment_counter(&self, _namespace: &str) -> Result<u64, StoreError> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    // Ids keep climbing across clears so they never repeat within a process
    async fn reset_counter(&self, _namespace: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
