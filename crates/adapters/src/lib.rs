// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Storage backends for the Turnstile primitives

pub mod memory;
pub mod noop;
pub mod sqlite;
pub mod traced;

pub use memory::{MemoryBackend, MemoryConnection, MemoryStore};
pub use noop::{NoOpBackend, NoOpConnection};
pub use sqlite::{SqliteBackend, SqliteConnection};
pub use traced::{TracedBackend, TracedConnection};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use memory::{PingBehavior, StoreCall};
