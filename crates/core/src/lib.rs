// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! turnstile-core: shared vocabulary for the Turnstile coordination primitives
//!
//! This crate provides:
//! - The storage capability traits every backend implements
//! - Reservation and connectivity model types
//! - The error taxonomy shared by backends and primitives
//! - Configuration structs loaded from TOML
//! - Clock and ID generation abstractions

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod model;

pub use backend::{StorageBackend, StorageConnection};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    validate_collection, BackendConfig, Config, DedupConfig, IdStrategy, LockConfig,
    SupervisorConfig, DEFAULT_DEDUP_COLLECTION, DEFAULT_DEDUP_TTL, DEFAULT_LOCK_COLLECTION,
};
pub use error::StoreError;
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use model::{ConnectionEvent, ConnectionState, Reservation, WorkerId};
