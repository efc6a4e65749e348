// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage capability traits
//!
//! A backend is a factory bound to one collection; the connection it opens
//! carries every primitive the lock and the dedup store are built on. Each
//! method must be atomic at the store: the primitives add no in-process
//! locking on top.

use crate::error::StoreError;
use crate::model::{Reservation, WorkerId};
use async_trait::async_trait;
use std::time::Duration;

/// Factory for connections to one concrete store
#[async_trait]
pub trait StorageBackend: Clone + Send + Sync + 'static {
    type Connection: StorageConnection;

    /// Short backend name used in logs and errors (e.g. "sqlite")
    fn name(&self) -> &'static str;

    /// Collection (table or key prefix) this backend's data lives under
    fn collection(&self) -> &str;

    /// Open a new connection
    async fn connect(&self) -> Result<Self::Connection, StoreError>;
}

/// One open connection to a store
///
/// Connections are cheap handles: clones share the underlying session, so
/// the heartbeat and user operations can run over it concurrently.
#[async_trait]
pub trait StorageConnection: Clone + Send + Sync + 'static {
    /// Release connection resources; closing twice is not an error
    async fn close(&self) -> Result<(), StoreError>;

    /// Liveness probe
    async fn ping(&self) -> Result<(), StoreError>;

    /// Resolves when the store closes this connection on its own.
    /// Stores that never do so return a future that never completes.
    async fn closed(&self);

    /// Insert a reservation, removing any prior reservation of the same worker
    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError>;

    /// Workers queued on an aggregate, oldest reservation first
    async fn list_reservations(&self, aggregate_id: &str) -> Result<Vec<WorkerId>, StoreError>;

    /// Remove every reservation for an aggregate
    async fn delete_reservations(&self, aggregate_id: &str) -> Result<(), StoreError>;

    /// Remove every reservation in the collection
    async fn delete_all_reservations(&self) -> Result<(), StoreError>;

    /// Record `key` for `ttl` if it is absent or expired.
    /// Returns true only for the call that performed the insert.
    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Remove `key` if, and only if, it has already expired
    async fn delete_expired_dedup_entry(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every dedup entry in the collection
    async fn delete_all_dedup_entries(&self) -> Result<(), StoreError>;

    /// Atomically increment and return the counter for `namespace`
    async fn increment_counter(&self, namespace: &str) -> Result<u64, StoreError>;

    /// Drop the counter for `namespace`; maintenance only
    async fn reset_counter(&self, namespace: &str) -> Result<(), StoreError>;
}
