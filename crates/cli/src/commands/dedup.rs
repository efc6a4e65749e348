// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `turnstile dedup` - Deduplication store commands

use crate::output::{self, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use turnstile_coordination::DeduplicationStore;
use turnstile_core::StorageBackend;

#[derive(Args)]
pub struct DedupArgs {
    #[command(subcommand)]
    pub command: DedupCommand,
}

#[derive(Subcommand)]
pub enum DedupCommand {
    /// Record a key; prints "added" the first time and "duplicate" after
    Add {
        /// Key to record
        key: String,
        /// Validity window (e.g. "30s", "1h"); defaults to the configured TTL
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,
    },
    /// Remove every entry and reset the id counter (maintenance)
    Clear,
}

#[derive(Serialize)]
struct AddInfo {
    key: String,
    added: bool,
}

impl fmt::Display for AddInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.added {
            write!(f, "added")
        } else {
            write!(f, "duplicate")
        }
    }
}

#[derive(Serialize)]
struct Cleared {
    cleared: bool,
}

impl fmt::Display for Cleared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cleared all dedup entries")
    }
}

pub async fn handle<B: StorageBackend>(
    command: DedupCommand,
    dedup: &DeduplicationStore<B>,
    format: OutputFormat,
) -> Result<()> {
    match command {
        DedupCommand::Add { key, ttl } => {
            let ttl = ttl.unwrap_or_else(|| dedup.ttl());
            let added = dedup.add_with_ttl(&key, ttl).await?;
            output::print(&AddInfo { key, added }, format);
        }
        DedupCommand::Clear => {
            dedup.clear().await?;
            output::print(&Cleared { cleared: true }, format);
        }
    }
    Ok(())
}
