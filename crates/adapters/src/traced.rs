// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced backend wrappers for consistent observability

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::Instrument;
use turnstile_core::{Reservation, StorageBackend, StorageConnection, StoreError, WorkerId};

/// Log completion or failure of one store operation
fn finish<T>(result: &Result<T, StoreError>, start: Instant, done: &'static str) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::info!(elapsed_ms, "{}", done),
        Err(e) => tracing::error!(elapsed_ms, error = %e, "operation failed"),
    }
}

/// Wrapper that adds tracing to any StorageBackend
#[derive(Clone)]
pub struct TracedBackend<B> {
    inner: B,
}

impl<B> TracedBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for TracedBackend<B> {
    type Connection = TracedConnection<B::Connection>;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn collection(&self) -> &str {
        self.inner.collection()
    }

    async fn connect(&self) -> Result<Self::Connection, StoreError> {
        let backend = self.inner.name();
        let span = tracing::info_span!("store.connect", backend, collection = self.collection());

        async {
            tracing::info!("connecting");
            let start = Instant::now();
            let result = self.inner.connect().await;
            finish(&result, start, "connected");
            result.map(|inner| TracedConnection { inner, backend })
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any StorageConnection
#[derive(Clone)]
pub struct TracedConnection<C> {
    inner: C,
    backend: &'static str,
}

#[async_trait]
impl<C: StorageConnection> StorageConnection for TracedConnection<C> {
    async fn close(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.close", backend = self.backend);

        async {
            let result = self.inner.close().await;
            // Closing a connection the store already dropped is expected
            match &result {
                Ok(()) => tracing::info!("closed"),
                Err(e) => tracing::warn!(error = %e, "close failed (may be expected)"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let result = self.inner.ping().await;
        tracing::trace!(backend = self.backend, ok = result.is_ok(), "pinged");
        result
    }

    async fn closed(&self) {
        self.inner.closed().await
    }

    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let span = tracing::info_span!(
            "store.reserve",
            backend = self.backend,
            worker_id = %reservation.worker_id,
            aggregate_id = %reservation.aggregate_id,
        );

        async {
            let start = Instant::now();
            let result = self.inner.upsert_reservation(reservation).await;
            finish(&result, start, "reserved");
            result
        }
        .instrument(span)
        .await
    }

    async fn list_reservations(&self, aggregate_id: &str) -> Result<Vec<WorkerId>, StoreError> {
        let span = tracing::debug_span!("store.list", backend = self.backend, aggregate_id);

        async {
            let result = self.inner.list_reservations(aggregate_id).await;
            match &result {
                Ok(workers) => tracing::debug!(queued = workers.len(), "listed"),
                Err(e) => tracing::error!(error = %e, "list failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_reservations(&self, aggregate_id: &str) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.resolve", backend = self.backend, aggregate_id);

        async {
            let start = Instant::now();
            let result = self.inner.delete_reservations(aggregate_id).await;
            finish(&result, start, "resolved");
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_all_reservations(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.clear_reservations", backend = self.backend);

        async {
            tracing::warn!("removing every reservation");
            let start = Instant::now();
            let result = self.inner.delete_all_reservations().await;
            finish(&result, start, "reservations cleared");
            result
        }
        .instrument(span)
        .await
    }

    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let span = tracing::info_span!(
            "store.dedup_add",
            backend = self.backend,
            key,
            ttl_ms = ttl.as_millis() as u64,
        );

        async {
            let start = Instant::now();
            let result = self.inner.insert_if_absent_with_expiry(key, ttl).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(true) => tracing::info!(elapsed_ms, "key recorded"),
                Ok(false) => tracing::info!(elapsed_ms, "duplicate key"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "dedup insert failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_expired_dedup_entry(&self, key: &str) -> Result<(), StoreError> {
        let result = self.inner.delete_expired_dedup_entry(key).await;
        // Cleanup is best-effort; expiry at the store is authoritative
        match &result {
            Ok(()) => tracing::debug!(backend = self.backend, key, "expired entry swept"),
            Err(e) => tracing::warn!(backend = self.backend, key, error = %e, "sweep failed"),
        }
        result
    }

    async fn delete_all_dedup_entries(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.clear_dedup", backend = self.backend);

        async {
            tracing::warn!("removing every dedup entry");
            let start = Instant::now();
            let result = self.inner.delete_all_dedup_entries().await;
            finish(&result, start, "dedup entries cleared");
            result
        }
        .instrument(span)
        .await
    }

    async fn increment_counter(&self, namespace: &str) -> Result<u64, StoreError> {
        let span = tracing::debug_span!("store.increment", backend = self.backend, namespace);

        async {
            let result = self.inner.increment_counter(namespace).await;
            match &result {
                Ok(value) => tracing::debug!(value, "incremented"),
                Err(e) => tracing::error!(error = %e, "increment failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn reset_counter(&self, namespace: &str) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.reset_counter", backend = self.backend, namespace);

        async {
            let start = Instant::now();
            let result = self.inner.reset_counter(namespace).await;
            finish(&result, start, "counter reset");
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
