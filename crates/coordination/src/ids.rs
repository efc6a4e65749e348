// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fresh identifiers for `get_new_id`

use std::sync::Arc;
use turnstile_core::{IdGen, IdStrategy, StorageConnection, StoreError, UuidIdGen};

/// Where new identifiers come from
#[derive(Clone)]
pub enum IdSource {
    /// Generated in process, no round trip
    Local(Arc<dyn IdGen>),
    /// Atomic increment of the store counter `nextItemId:<collection>`
    Counter,
}

impl IdSource {
    pub fn from_strategy(strategy: IdStrategy) -> Self {
        match strategy {
            IdStrategy::Uuid => IdSource::Local(Arc::new(UuidIdGen)),
            IdStrategy::Counter => IdSource::Counter,
        }
    }

    /// Counter namespace for a collection
    pub fn counter_namespace(collection: &str) -> String {
        format!("nextItemId:{}", collection)
    }

    /// Produce the next identifier. `conn` is only used by the counter
    /// source; the local source works while disconnected.
    pub async fn next<C: StorageConnection>(
        &self,
        conn: impl FnOnce() -> Result<C, StoreError>,
        collection: &str,
    ) -> Result<String, StoreError> {
        match self {
            IdSource::Local(generator) => Ok(generator.next()),
            IdSource::Counter => {
                let value = conn()?
                    .increment_counter(&Self::counter_namespace(collection))
                    .await?;
                Ok(value.to_string())
            }
        }
    }
}

impl std::fmt::Debug for IdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdSource::Local(_) => write!(f, "Local"),
            IdSource::Counter => write!(f, "Counter"),
        }
    }
}
