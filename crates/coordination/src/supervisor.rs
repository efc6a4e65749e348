// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle and heartbeat
//!
//! The supervisor owns the single connection a primitive works over. It
//! validates the connection on connect, watches it with an optional
//! heartbeat and a close watcher, and tears it down exactly once when
//! either notices the store is gone.
//!
//! Every connection carries an epoch. Background tasks only ever tear down
//! the epoch they were started for, so a late heartbeat failure cannot
//! disconnect a newer connection.

use crate::events::{ConnectionReceiver, ConnectivityBus};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use turnstile_core::{
    ConnectionEvent, ConnectionState, StorageBackend, StorageConnection, StoreError,
    SupervisorConfig,
};

struct Session<C> {
    conn: C,
    epoch: u64,
    /// Flipped to true on teardown; stops the heartbeat, the close watcher
    /// and pending cleanup timers
    stop: watch::Sender<bool>,
}

struct Inner<B: StorageBackend> {
    backend: B,
    config: SupervisorConfig,
    session: Mutex<Option<Session<B::Connection>>>,
    state: watch::Sender<ConnectionState>,
    bus: ConnectivityBus,
    epochs: AtomicU64,
    /// Serializes connect() so two callers cannot both open a connection
    connecting: tokio::sync::Mutex<()>,
}

impl<B: StorageBackend> Inner<B> {
    fn live(&self) -> Option<(B::Connection, u64, watch::Receiver<bool>)> {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session
            .as_ref()
            .map(|s| (s.conn.clone(), s.epoch, s.stop.subscribe()))
    }

    fn current_epoch(&self) -> Option<u64> {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.as_ref().map(|s| s.epoch)
    }

    /// Tear down the live session. With `expected` set, only that epoch is
    /// torn down. Returns whether anything was torn down.
    ///
    /// State and event are published under the session lock, so they are
    /// ordered with the `Connected` of any concurrent connect.
    async fn teardown(&self, expected: Option<u64>, reason: &'static str) -> bool {
        let session = {
            let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
            let stale = match (guard.as_ref(), expected) {
                (None, _) => true,
                (Some(session), Some(epoch)) => session.epoch != epoch,
                (Some(_), None) => false,
            };
            if stale {
                return false;
            }
            let Some(session) = guard.take() else {
                return false;
            };
            let _ = session.stop.send(true);
            self.state.send_replace(ConnectionState::Disconnected);
            self.bus.publish(ConnectionEvent::Disconnected);
            session
        };

        tracing::info!(
            backend = self.backend.name(),
            epoch = session.epoch,
            reason,
            "disconnected"
        );

        if let Err(e) = session.conn.close().await {
            tracing::warn!(error = %e, "close after disconnect failed");
        }
        true
    }
}

/// Supervises one connection to a storage backend
///
/// Clones share the connection, state and subscribers.
pub struct ConnectionSupervisor<B: StorageBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: StorageBackend> Clone for ConnectionSupervisor<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: StorageBackend> ConnectionSupervisor<B> {
    pub fn new(backend: B, config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                session: Mutex::new(None),
                state,
                bus: ConnectivityBus::new(),
                epochs: AtomicU64::new(0),
                connecting: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Open and validate a connection; no-op when already connected
    pub async fn connect(&self) -> Result<(), StoreError> {
        let _connecting = self.inner.connecting.lock().await;
        if self.inner.current_epoch().is_some() {
            return Ok(());
        }

        let backend = self.inner.backend.name();
        let collection = self.inner.backend.collection();
        tracing::info!(backend, collection, "connecting");

        let conn = self.inner.backend.connect().await?;
        if let Err(e) = self.validate(&conn).await {
            tracing::error!(backend, error = %e, "connection failed validation");
            if let Err(close_err) = conn.close().await {
                tracing::warn!(error = %close_err, "close after failed validation failed");
            }
            return Err(e);
        }

        let epoch = self.inner.epochs.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop, stop_rx) = watch::channel(false);
        {
            let mut session = self.inner.session.lock().unwrap_or_else(|e| e.into_inner());
            *session = Some(Session {
                conn: conn.clone(),
                epoch,
                stop,
            });
            self.inner.state.send_replace(ConnectionState::Connected);
            self.inner.bus.publish(ConnectionEvent::Connected);
        }
        tracing::info!(backend, collection, epoch, "connected");

        spawn_close_watcher(
            Arc::downgrade(&self.inner),
            conn.clone(),
            epoch,
            stop_rx.clone(),
        );
        if let Some(interval) = self.inner.config.heartbeat {
            spawn_heartbeat(Arc::downgrade(&self.inner), conn, epoch, interval, stop_rx);
        }
        Ok(())
    }

    /// One probe before the connection is handed out. Bounded by the
    /// heartbeat grace period when a heartbeat is configured.
    async fn validate(&self, conn: &B::Connection) -> Result<(), StoreError> {
        match self.inner.config.grace_period() {
            Some(grace) => tokio::time::timeout(grace, conn.ping())
                .await
                .map_err(|_| {
                    StoreError::connection(
                        self.inner.backend.name(),
                        format!("validation ping timed out after {}ms", grace.as_millis()),
                    )
                })?,
            None => conn.ping().await,
        }
    }

    /// Stop the heartbeat and release the connection; idempotent
    pub async fn disconnect(&self) {
        self.inner.teardown(None, "requested").await;
    }

    /// The live connection, or `Unavailable` while disconnected
    pub fn connection(&self) -> Result<B::Connection, StoreError> {
        self.inner
            .live()
            .map(|(conn, _, _)| conn)
            .ok_or(StoreError::Unavailable)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Follow state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receive `Connected` and `Disconnected` events from now on
    pub fn subscribe(&self) -> ConnectionReceiver {
        self.inner.bus.subscribe()
    }

    /// Run `task` over the live connection after `delay`
    ///
    /// The timer is dropped if the connection is torn down first, and the
    /// task is skipped unless the same connection is still live when the
    /// timer fires. Does nothing while disconnected.
    pub fn schedule<F, Fut>(&self, delay: Duration, task: F)
    where
        F: FnOnce(B::Connection) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some((conn, epoch, mut stop)) = self.inner.live() else {
            return;
        };
        let inner = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            tokio::select! {
                _ = stop.changed() => {}
                _ = tokio::time::sleep(delay) => {
                    let live = inner
                        .upgrade()
                        .is_some_and(|inner| inner.current_epoch() == Some(epoch));
                    if live {
                        task(conn).await;
                    }
                }
            }
        });
    }
}

/// Tear the session down as soon as the store closes it on its own
fn spawn_close_watcher<B: StorageBackend>(
    inner: Weak<Inner<B>>,
    conn: B::Connection,
    epoch: u64,
    mut stop: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = stop.changed() => {}
            _ = conn.closed() => {
                tracing::warn!(epoch, "store closed the connection");
                if let Some(inner) = inner.upgrade() {
                    inner.teardown(Some(epoch), "closed by store").await;
                }
            }
        }
    });
}

/// Probe every `interval`; a probe that errors or outlasts half the
/// interval tears the session down
fn spawn_heartbeat<B: StorageBackend>(
    inner: Weak<Inner<B>>,
    conn: B::Connection,
    epoch: u64,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let grace = interval / 2;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {}
            }

            tracing::trace!(epoch, "heartbeat probe");
            let failure = tokio::select! {
                _ = stop.changed() => break,
                outcome = tokio::time::timeout(grace, conn.ping()) => match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(_) => Some(StoreError::HeartbeatTimeout(grace)),
                },
            };

            if let Some(err) = failure {
                tracing::error!(epoch, error = %err, "heartbeat failed");
                if let Some(inner) = inner.upgrade() {
                    inner.teardown(Some(epoch), "heartbeat").await;
                }
                break;
            }
        }
        tracing::trace!(epoch, "heartbeat stopped");
    });
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
