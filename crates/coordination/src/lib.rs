// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! turnstile-coordination: the coordination primitives
//!
//! - [`ConnectionSupervisor`]: connection lifecycle, heartbeat and
//!   connectivity notifications shared by both primitives
//! - [`DistributedLock`]: per-aggregate FIFO reservation queues
//! - [`DeduplicationStore`]: time-bounded "seen this key" records

pub mod dedup;
pub mod events;
pub mod ids;
pub mod lock;
pub mod supervisor;

pub use dedup::DeduplicationStore;
pub use events::{ConnectionReceiver, ConnectivityBus};
pub use ids::IdSource;
pub use lock::DistributedLock;
pub use supervisor::ConnectionSupervisor;
