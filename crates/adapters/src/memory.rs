// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process key-value backend
//!
//! Maps the primitives onto a key-value store the way a networked one is
//! mapped:
//! - reservations are lists under `<collection>:<aggregate>`, appended in
//!   arrival order. A worker index lets a new reservation find and remove
//!   the worker's previous entry inside the same atomic step.
//! - dedup keys are set-if-absent, then given an expiry in a second call,
//!   with whole-second granularity. Expired keys are purged lazily as the
//!   key space grows.
//! - counters are plain integers under their namespace.
//!
//! A [`MemoryStore`] is the "server": every connection opened from a
//! backend sharing it sees the same data, which is how tests model several
//! workers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use turnstile_core::{
    validate_collection, Clock, Reservation, StorageBackend, StorageConnection, StoreError,
    SystemClock, WorkerId,
};

const BACKEND: &str = "memory";

/// Smallest key count that triggers a purge of expired dedup keys
const MIN_PURGE_AT: usize = 64;

/// How the store answers liveness probes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PingBehavior {
    #[default]
    Respond,
    /// Reply with an error
    Fail,
    /// Never reply
    Hang,
}

/// Recorded store call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Connect,
    Close,
    Ping,
    Reserve { worker_id: String, key: String },
    ListReservations { key: String },
    DeleteReservations { key: String },
    DeleteAllReservations { collection: String },
    SetIfAbsent { key: String },
    Expire { key: String, seconds: u64 },
    DeleteExpired { key: String },
    DeleteAllDedup { collection: String },
    Increment { namespace: String },
    ResetCounter { namespace: String },
}

#[derive(Clone, Debug)]
struct ListEntry {
    worker_id: WorkerId,
    timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
struct StoredKey {
    /// `None` between the insert and the expire call
    expires_at: Option<Instant>,
}

impl StoredKey {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Faults {
    ping: PingBehavior,
    refuse_connections: bool,
    fail_expiry: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    lists: HashMap<String, Vec<ListEntry>>,
    /// (collection, worker) -> list key holding the worker's reservation
    owners: HashMap<(String, WorkerId), String>,
    keys: HashMap<String, StoredKey>,
    /// Key count at which the next insert purges expired keys
    purge_at: usize,
    counters: HashMap<String, u64>,
    faults: Faults,
    #[cfg(any(test, feature = "test-support"))]
    calls: Vec<StoreCall>,
}

impl StoreState {
    #[cfg(any(test, feature = "test-support"))]
    fn record(&mut self, call: StoreCall) {
        self.calls.push(call);
    }

    #[cfg(not(any(test, feature = "test-support")))]
    fn record(&mut self, _call: StoreCall) {}

    /// Drop expired keys once the key space doubles since the last purge
    fn purge_expired_keys(&mut self, now: Instant) {
        if self.keys.len() < self.purge_at {
            return;
        }
        self.keys.retain(|_, k| !k.is_expired(now));
        self.purge_at = (self.keys.len() * 2).max(MIN_PURGE_AT);
    }

    fn remove_from_list(&mut self, list_key: &str, worker_id: &WorkerId) {
        if let Some(entries) = self.lists.get_mut(list_key) {
            entries.retain(|e| &e.worker_id != worker_id);
            if entries.is_empty() {
                self.lists.remove(list_key);
            }
        }
    }
}

/// Shared in-process store
#[derive(Clone)]
pub struct MemoryStore<C: Clock = SystemClock> {
    state: Arc<Mutex<StoreState>>,
    shutdown: Arc<watch::Sender<bool>>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Create a store whose expiries follow the given clock
    pub fn with_clock(clock: C) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            shutdown: Arc::new(shutdown),
            clock,
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

// Fault injection and inspection for tests
#[cfg(any(test, feature = "test-support"))]
impl<C: Clock> MemoryStore<C> {
    /// All recorded calls, oldest first
    pub fn calls(&self) -> Vec<StoreCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear());
    }

    pub fn set_ping(&self, behavior: PingBehavior) {
        self.with_state(|s| s.faults.ping = behavior);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.with_state(|s| s.faults.refuse_connections = refuse);
    }

    /// Make the expire step of the dedup insert fail
    pub fn fail_expiry(&self, fail: bool) {
        self.with_state(|s| s.faults.fail_expiry = fail);
    }

    /// Close every open connection from the store side
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Accept connections again after a shutdown; data survives
    pub fn restart(&self) {
        self.shutdown.send_replace(false);
    }

    /// Number of dedup keys physically present, expired or not
    pub fn dedup_entry_count(&self) -> usize {
        self.with_state(|s| s.keys.len())
    }

    /// Number of reservations across all collections
    pub fn reservation_count(&self) -> usize {
        self.with_state(|s| s.lists.values().map(Vec::len).sum())
    }
}

/// Backend bound to one collection of a [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryBackend<C: Clock = SystemClock> {
    store: MemoryStore<C>,
    collection: String,
}

impl<C: Clock> MemoryBackend<C> {
    pub fn new(store: MemoryStore<C>, collection: impl Into<String>) -> Result<Self, StoreError> {
        let collection = collection.into();
        validate_collection(&collection)?;
        Ok(Self { store, collection })
    }

    pub fn store(&self) -> &MemoryStore<C> {
        &self.store
    }
}

#[async_trait]
impl<C: Clock> StorageBackend for MemoryBackend<C> {
    type Connection = MemoryConnection<C>;

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn connect(&self) -> Result<MemoryConnection<C>, StoreError> {
        let refused = self.store.with_state(|s| {
            s.record(StoreCall::Connect);
            s.faults.refuse_connections
        });
        if refused || self.store.is_shut_down() {
            return Err(StoreError::connection(BACKEND, "connection refused"));
        }
        Ok(MemoryConnection {
            store: self.store.clone(),
            collection: Arc::from(self.collection.as_str()),
            open: Arc::new(AtomicBool::new(true)),
        })
    }
}

/// Open connection to a [`MemoryStore`]
#[derive(Clone)]
pub struct MemoryConnection<C: Clock = SystemClock> {
    store: MemoryStore<C>,
    collection: Arc<str>,
    open: Arc<AtomicBool>,
}

impl<C: Clock> MemoryConnection<C> {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if !self.open.load(Ordering::SeqCst) || self.store.is_shut_down() {
            return Err(StoreError::connection(BACKEND, "connection closed"));
        }
        Ok(())
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.collection, suffix)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.collection)
    }
}

/// Whole seconds of expiry for a TTL, rounded up, never below one second
fn expiry_seconds(ttl: Duration) -> u64 {
    let rounded = ttl.as_millis().div_ceil(1000);
    u64::try_from(rounded).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl<C: Clock> StorageConnection for MemoryConnection<C> {
    async fn close(&self) -> Result<(), StoreError> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.store.with_state(|s| s.record(StoreCall::Close));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let behavior = self.store.with_state(|s| {
            s.record(StoreCall::Ping);
            s.faults.ping
        });
        match behavior {
            PingBehavior::Respond => Ok(()),
            PingBehavior::Fail => Err(StoreError::connection(BACKEND, "ping refused")),
            PingBehavior::Hang => std::future::pending().await,
        }
    }

    async fn closed(&self) {
        let mut shutdown = self.store.shutdown.subscribe();
        let _ = shutdown.wait_for(|down| *down).await;
    }

    async fn upsert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        self.ensure_open()?;
        let list_key = self.key(&reservation.aggregate_id);
        let owner = (self.collection.to_string(), reservation.worker_id.clone());

        self.store.with_state(|s| {
            s.record(StoreCall::Reserve {
                worker_id: reservation.worker_id.to_string(),
                key: list_key.clone(),
            });
            if let Some(previous) = s.owners.remove(&owner) {
                s.remove_from_list(&previous, &reservation.worker_id);
            }
            s.lists.entry(list_key.clone()).or_default().push(ListEntry {
                worker_id: reservation.worker_id.clone(),
                timestamp: reservation.timestamp,
            });
            s.owners.insert(owner, list_key);
        });
        Ok(())
    }

    async fn list_reservations(&self, aggregate_id: &str) -> Result<Vec<WorkerId>, StoreError> {
        self.ensure_open()?;
        let list_key = self.key(aggregate_id);

        let mut entries = self.store.with_state(|s| {
            s.record(StoreCall::ListReservations {
                key: list_key.clone(),
            });
            s.lists.get(&list_key).cloned().unwrap_or_default()
        });
        // Stable: equal timestamps keep arrival order
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries.into_iter().map(|e| e.worker_id).collect())
    }

    async fn delete_reservations(&self, aggregate_id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let list_key = self.key(aggregate_id);

        self.store.with_state(|s| {
            s.record(StoreCall::DeleteReservations {
                key: list_key.clone(),
            });
            for entry in s.lists.remove(&list_key).unwrap_or_default() {
                let owner = (self.collection.to_string(), entry.worker_id);
                if s.owners.get(&owner) == Some(&list_key) {
                    s.owners.remove(&owner);
                }
            }
        });
        Ok(())
    }

    async fn delete_all_reservations(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let prefix = self.prefix();

        self.store.with_state(|s| {
            s.record(StoreCall::DeleteAllReservations {
                collection: self.collection.to_string(),
            });
            s.lists.retain(|key, _| !key.starts_with(&prefix));
            s.owners
                .retain(|(collection, _), _| collection.as_str() != &*self.collection);
        });
        Ok(())
    }

    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let stored_key = self.key(key);
        let seconds = expiry_seconds(ttl);

        // Step one: set-if-absent. An expired key counts as absent.
        let now = self.store.clock.now();
        let inserted = self.store.with_state(|s| {
            s.record(StoreCall::SetIfAbsent {
                key: stored_key.clone(),
            });
            s.purge_expired_keys(now);
            match s.keys.get(&stored_key) {
                Some(existing) if !existing.is_expired(now) => false,
                _ => {
                    s.keys
                        .insert(stored_key.clone(), StoredKey { expires_at: None });
                    true
                }
            }
        });
        if !inserted {
            return Ok(false);
        }

        // Step two: attach the expiry. The insert above stands regardless.
        let expiry_failed = |message: String| StoreError::ExpiryNotSet {
            key: key.to_string(),
            message,
        };
        self.ensure_open().map_err(|e| expiry_failed(e.to_string()))?;
        let now = self.store.clock.now();
        let rejected = self.store.with_state(|s| {
            s.record(StoreCall::Expire {
                key: stored_key.clone(),
                seconds,
            });
            if s.faults.fail_expiry {
                return true;
            }
            if let Some(stored) = s.keys.get_mut(&stored_key) {
                stored.expires_at = Some(now + Duration::from_secs(seconds));
            }
            false
        });
        if rejected {
            return Err(expiry_failed("expire rejected by store".to_string()));
        }
        Ok(true)
    }

    async fn delete_expired_dedup_entry(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let stored_key = self.key(key);
        let now = self.store.clock.now();

        self.store.with_state(|s| {
            s.record(StoreCall::DeleteExpired {
                key: stored_key.clone(),
            });
            if s.keys.get(&stored_key).is_some_and(|k| k.is_expired(now)) {
                s.keys.remove(&stored_key);
            }
        });
        Ok(())
    }

    async fn delete_all_dedup_entries(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let prefix = self.prefix();

        self.store.with_state(|s| {
            s.record(StoreCall::DeleteAllDedup {
                collection: self.collection.to_string(),
            });
            s.keys.retain(|key, _| !key.starts_with(&prefix));
        });
        Ok(())
    }

    async fn increment_counter(&self, namespace: &str) -> Result<u64, StoreError> {
        self.ensure_open()?;
        let value = self.store.with_state(|s| {
            s.record(StoreCall::Increment {
                namespace: namespace.to_string(),
            });
            let counter = s.counters.entry(namespace.to_string()).or_insert(0);
            *counter += 1;
            *counter
        });
        Ok(value)
    }

    async fn reset_counter(&self, namespace: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.store.with_state(|s| {
            s.record(StoreCall::ResetCounter {
                namespace: namespace.to_string(),
            });
            s.counters.remove(namespace);
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
