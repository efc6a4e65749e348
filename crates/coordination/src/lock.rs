// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed FIFO lock over aggregates
//!
//! Not a blocking mutex. Workers enqueue a reservation for an aggregate and
//! inspect the queue; the worker at the head holds the lock. Callers do
//! their own arbitration (poll, wait, retry) and call `resolve` when the
//! aggregate is done.

use crate::ids::IdSource;
use crate::supervisor::ConnectionSupervisor;
use std::sync::Arc;
use turnstile_core::{
    Clock, ConnectionState, IdGen, LockConfig, Reservation, StorageBackend, StorageConnection,
    StoreError, SystemClock, WorkerId,
};

/// FIFO reservation queues, one per aggregate
#[derive(Clone)]
pub struct DistributedLock<B: StorageBackend, C: Clock = SystemClock> {
    supervisor: ConnectionSupervisor<B>,
    ids: IdSource,
    clock: C,
}

impl<B: StorageBackend> DistributedLock<B> {
    pub fn new(backend: B, config: &LockConfig) -> Self {
        Self {
            supervisor: ConnectionSupervisor::new(backend, config.supervisor()),
            ids: IdSource::from_strategy(config.id_strategy),
            clock: SystemClock,
        }
    }
}

impl<B: StorageBackend, C: Clock> DistributedLock<B, C> {
    /// Stamp reservations with another clock
    pub fn with_clock<C2: Clock>(self, clock: C2) -> DistributedLock<B, C2> {
        DistributedLock {
            supervisor: self.supervisor,
            ids: self.ids,
            clock,
        }
    }

    /// Generate local ids with `generator` instead of the configured source
    pub fn with_id_gen(mut self, generator: impl IdGen) -> Self {
        self.ids = IdSource::Local(Arc::new(generator));
        self
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor<B> {
        &self.supervisor
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub async fn connect(&self) -> Result<(), StoreError> {
        self.supervisor.connect().await
    }

    pub async fn disconnect(&self) {
        self.supervisor.disconnect().await
    }

    /// Enqueue `worker_id` on `aggregate_id` at the current time, dropping
    /// whatever reservation the worker held before
    pub async fn reserve(&self, worker_id: &WorkerId, aggregate_id: &str) -> Result<(), StoreError> {
        let conn = self.supervisor.connection()?;
        let reservation = Reservation::new(worker_id.clone(), aggregate_id, self.clock.utc_now());
        conn.upsert_reservation(&reservation).await
    }

    /// Queue for `aggregate_id`, head first
    pub async fn get_all(&self, aggregate_id: &str) -> Result<Vec<WorkerId>, StoreError> {
        self.supervisor
            .connection()?
            .list_reservations(aggregate_id)
            .await
    }

    /// Whether `worker_id` is at the head of the queue
    pub async fn is_owner(&self, worker_id: &WorkerId, aggregate_id: &str) -> Result<bool, StoreError> {
        let queue = self.get_all(aggregate_id).await?;
        Ok(queue.first() == Some(worker_id))
    }

    /// Drop the whole queue for `aggregate_id`
    pub async fn resolve(&self, aggregate_id: &str) -> Result<(), StoreError> {
        self.supervisor
            .connection()?
            .delete_reservations(aggregate_id)
            .await
    }

    /// Remove every reservation and the id counter; maintenance only
    pub async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.supervisor.connection()?;
        conn.delete_all_reservations().await?;
        let collection = self.supervisor.backend().collection();
        conn.reset_counter(&IdSource::counter_namespace(collection))
            .await
    }

    pub async fn get_new_id(&self) -> Result<String, StoreError> {
        let collection = self.supervisor.backend().collection();
        self.ids
            .next(|| self.supervisor.connection(), collection)
            .await
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
