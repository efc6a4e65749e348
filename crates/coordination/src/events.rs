// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity bus for routing connection events to subscribers

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use turnstile_core::ConnectionEvent;

/// Sender for event delivery
pub type ConnectionSender = mpsc::UnboundedSender<ConnectionEvent>;
/// Receiver for event delivery
pub type ConnectionReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Fans connection events out to every live subscriber
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct ConnectivityBus {
    subscribers: Arc<Mutex<Vec<ConnectionSender>>>,
}

impl ConnectivityBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> ConnectionReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub fn publish(&self, event: ConnectionEvent) {
        tracing::debug!(event = event.name(), "publishing connection event");
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| tx.send(event).is_ok());
    }

    /// Get count of live subscribers
    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subs.retain(|tx| !tx.is_closed());
        subs.len()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
