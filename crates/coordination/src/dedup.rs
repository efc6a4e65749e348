// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deduplication store
//!
//! Records that a key (typically a command id) was seen, for a bounded
//! time. Expiry is enforced by the store; the optional local cleanup only
//! sweeps expired entries early.

use crate::ids::IdSource;
use crate::supervisor::ConnectionSupervisor;
use std::sync::Arc;
use std::time::Duration;
use turnstile_core::{
    ConnectionState, DedupConfig, IdGen, StorageBackend, StorageConnection, StoreError,
};

/// Time-bounded "seen this key" records
#[derive(Clone)]
pub struct DeduplicationStore<B: StorageBackend> {
    supervisor: ConnectionSupervisor<B>,
    ids: IdSource,
    ttl: Duration,
    cleanup: bool,
}

impl<B: StorageBackend> DeduplicationStore<B> {
    pub fn new(backend: B, config: &DedupConfig) -> Self {
        Self {
            supervisor: ConnectionSupervisor::new(backend, config.supervisor()),
            ids: IdSource::from_strategy(config.id_strategy),
            ttl: config.ttl,
            cleanup: config.cleanup,
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

    /// Default validity window for `add`
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn connect(&self) -> Result<(), StoreError> {
        self.supervisor.connect().await
    }

    pub async fn disconnect(&self) {
        self.supervisor.disconnect().await
    }

    /// Record `key` for the default TTL; true only if this call recorded it
    pub async fn add(&self, key: &str) -> Result<bool, StoreError> {
        self.add_with_ttl(key, self.ttl).await
    }

    /// Record `key` for `ttl`; true only if this call recorded it
    pub async fn add_with_ttl(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let conn = self.supervisor.connection()?;

        match conn.insert_if_absent_with_expiry(key, ttl).await {
            Ok(true) => {
                if self.cleanup {
                    self.schedule_sweep(key, ttl);
                }
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(err @ StoreError::ExpiryNotSet { .. }) => {
                // The key is stored; it stays a duplicate until removed by hand
                tracing::error!(key, error = %err, "dedup key stored without expiry");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn schedule_sweep(&self, key: &str, ttl: Duration) {
        let key = key.to_string();
        self.supervisor.schedule(ttl, move |conn| async move {
            if let Err(e) = conn.delete_expired_dedup_entry(&key).await {
                tracing::warn!(key = %key, error = %e, "expired entry sweep failed");
            }
        });
    }

    pub async fn get_new_id(&self) -> Result<String, StoreError> {
        let collection = self.supervisor.backend().collection();
        self.ids
            .next(|| self.supervisor.connection(), collection)
            .await
    }

    /// Remove every entry and the id counter; maintenance only
    pub async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.supervisor.connection()?;
        conn.delete_all_dedup_entries().await?;
        let collection = self.supervisor.backend().collection();
        conn.reset_counter(&IdSource::counter_namespace(collection))
            .await
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
