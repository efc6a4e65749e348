// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by storage backends and coordination primitives

use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by storage backends and the primitives built on them
///
/// Every variant is recoverable: callers reconnect and retry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connect, ping, or an operation failed against the store
    #[error("connection error ({backend}): {message}")]
    Connection {
        backend: &'static str,
        message: String,
    },

    /// Operation attempted while the supervisor is disconnected
    #[error("store unavailable: not connected")]
    Unavailable,

    /// Heartbeat probe did not complete within the grace period.
    /// Only ever logged by the supervisor; callers never receive it.
    #[error("heartbeat timed out after {}ms", .0.as_millis())]
    HeartbeatTimeout(Duration),

    /// A split insert stored the key but could not attach its expiry
    #[error("expiry not set for key {key}: {message}")]
    ExpiryNotSet { key: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Wrap a backend-specific failure as a connection error
    pub fn connection(backend: &'static str, err: impl Display) -> Self {
        StoreError::Connection {
            backend,
            message: err.to_string(),
        }
    }
}
