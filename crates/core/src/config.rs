// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for backends, the lock and the dedup store
//!
//! Loaded from TOML; durations are written humanly (`"30s"`, `"1h"`).
//!
//! ```toml
//! [backend]
//! type = "sqlite"
//! path = "/var/lib/turnstile/coordination.db"
//!
//! [lock]
//! heartbeat = "10s"
//!
//! [dedup]
//! ttl = "15m"
//! id_strategy = "counter"
//! ```

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default collection for lock reservations
pub const DEFAULT_LOCK_COLLECTION: &str = "aggregatelock";
/// Default collection for dedup entries
pub const DEFAULT_DEDUP_COLLECTION: &str = "commandbumper";
/// Default validity window of a dedup entry
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(60 * 60);

/// How `get_new_id` produces identifiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random structured identifier, generated locally
    #[default]
    Uuid,
    /// Atomic counter increment at the store
    Counter,
}

/// Which store backs the primitives
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process key-value store; state lives as long as the process
    #[default]
    Memory,
    /// SQLite database file shared by every worker on the host
    Sqlite { path: PathBuf },
    /// Store nothing; every dedup insert succeeds and every queue is empty
    Noop,
}

/// Connection supervision settings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Interval between liveness probes; `None` disables the heartbeat
    pub heartbeat: Option<Duration>,
}

impl SupervisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = Some(interval);
        self
    }

    /// Time a probe may take before the connection is declared dead
    pub fn grace_period(&self) -> Option<Duration> {
        self.heartbeat.map(|interval| interval / 2)
    }
}

/// Distributed lock configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Collection holding the reservations
    pub collection: String,
    /// Heartbeat interval for the lock's connection
    #[serde(with = "humantime_serde")]
    pub heartbeat: Option<Duration>,
    pub id_strategy: IdStrategy,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_LOCK_COLLECTION.to_string(),
            heartbeat: None,
            id_strategy: IdStrategy::default(),
        }
    }
}

impl LockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = Some(interval);
        self
    }

    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            heartbeat: self.heartbeat,
        }
    }
}

/// Deduplication store configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Collection holding the dedup entries
    pub collection: String,
    /// Validity window used by `add` when no TTL is given
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Heartbeat interval for the store's connection
    #[serde(with = "humantime_serde")]
    pub heartbeat: Option<Duration>,
    pub id_strategy: IdStrategy,
    /// Schedule a local timer that deletes each entry once it expires.
    /// Expiry at the store is authoritative either way.
    pub cleanup: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_DEDUP_COLLECTION.to_string(),
            ttl: DEFAULT_DEDUP_TTL,
            heartbeat: None,
            id_strategy: IdStrategy::default(),
            cleanup: false,
        }
    }
}

impl DedupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = Some(interval);
        self
    }

    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn with_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup = enabled;
        self
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            heartbeat: self.heartbeat,
        }
    }
}

/// Top-level configuration file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub lock: LockConfig,
    pub dedup: DedupConfig,
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, StoreError> {
        let config: Config = toml::from_str(source)
            .map_err(|e| StoreError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_collection(&self.lock.collection)?;
        validate_collection(&self.dedup.collection)?;
        if self.dedup.ttl.is_zero() {
            return Err(StoreError::Config(
                "dedup.ttl must be greater than zero".to_string(),
            ));
        }
        for (section, heartbeat) in [("lock", self.lock.heartbeat), ("dedup", self.dedup.heartbeat)]
        {
            if heartbeat.is_some_and(|h| h.is_zero()) {
                return Err(StoreError::Config(format!(
                    "{}.heartbeat must be greater than zero",
                    section
                )));
            }
        }
        Ok(())
    }
}

/// Collections become table names and key prefixes, so they are restricted
/// to ASCII identifiers.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "collection name {:?} must be an ASCII identifier",
            name
        )))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
