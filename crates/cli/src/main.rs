// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! turnstile - maintenance CLI for the coordination store

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{dedup, lock, status};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use turnstile_adapters::{MemoryBackend, MemoryStore, NoOpBackend, SqliteBackend, TracedBackend};
use turnstile_coordination::{DeduplicationStore, DistributedLock};
use turnstile_core::{BackendConfig, Config, StorageBackend, StoreError};

use crate::error::TurnstileError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "turnstile",
    version,
    about = "Turnstile - inspect and maintain distributed locks and dedup records"
)]
struct Cli {
    /// Configuration file (default: <config dir>/turnstile/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate reservation queues
    Lock(lock::LockArgs),
    /// Deduplication records
    Dedup(dedup::DedupArgs),
    /// Print a fresh identifier
    Id {
        /// Use the dedup store's id source instead of the lock's
        #[arg(long)]
        dedup: bool,
    },
    /// Connect to both stores and report their state
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<TurnstileError>() {
                Some(friendly) => eprint!("{}", friendly),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so command output on stdout stays parseable
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("turnstile").join("config.toml"))
}

/// An explicit path must load; the default path is optional
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path).map_err(|e| TurnstileError::config_invalid(path, e).into());
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            Config::load(&path).map_err(|e| TurnstileError::config_invalid(&path, e).into())
        }
        _ => Ok(Config::default()),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(backend = ?config.backend, "loaded configuration");

    match &config.backend {
        BackendConfig::Memory => {
            let store = MemoryStore::new();
            let lock_backend = MemoryBackend::new(store.clone(), &config.lock.collection)?;
            let dedup_backend = MemoryBackend::new(store, &config.dedup.collection)?;
            dispatch(cli.command, cli.format, &config, lock_backend, dedup_backend).await
        }
        BackendConfig::Sqlite { path } => {
            let lock_backend = SqliteBackend::new(path.clone(), &config.lock.collection)?;
            let dedup_backend = SqliteBackend::new(path.clone(), &config.dedup.collection)?;
            dispatch(cli.command, cli.format, &config, lock_backend, dedup_backend).await
        }
        BackendConfig::Noop => {
            let backend = NoOpBackend::new();
            dispatch(cli.command, cli.format, &config, backend.clone(), backend).await
        }
    }
}

async fn connect_lock<B: StorageBackend>(
    backend: B,
    config: &Config,
) -> Result<DistributedLock<TracedBackend<B>>> {
    let lock = DistributedLock::new(TracedBackend::new(backend), &config.lock);
    lock.connect()
        .await
        .map_err(|e| unreachable_store("lock", lock.supervisor().backend(), e))?;
    Ok(lock)
}

async fn connect_dedup<B: StorageBackend>(
    backend: B,
    config: &Config,
) -> Result<DeduplicationStore<TracedBackend<B>>> {
    let dedup = DeduplicationStore::new(TracedBackend::new(backend), &config.dedup);
    dedup
        .connect()
        .await
        .map_err(|e| unreachable_store("dedup store", dedup.supervisor().backend(), e))?;
    Ok(dedup)
}

fn unreachable_store<B: StorageBackend>(primitive: &str, backend: &B, err: StoreError) -> anyhow::Error {
    TurnstileError::store_unreachable(primitive, backend.name(), backend.collection(), err).into()
}

async fn dispatch<B: StorageBackend>(
    command: Commands,
    format: OutputFormat,
    config: &Config,
    lock_backend: B,
    dedup_backend: B,
) -> Result<()> {
    match command {
        Commands::Lock(args) => {
            let lock = connect_lock(lock_backend, config).await?;
            let result = lock::handle(args.command, &lock, format).await;
            lock.disconnect().await;
            result
        }
        Commands::Dedup(args) => {
            let dedup = connect_dedup(dedup_backend, config).await?;
            let result = dedup::handle(args.command, &dedup, format).await;
            dedup.disconnect().await;
            result
        }
        Commands::Id { dedup: true } => {
            let dedup = connect_dedup(dedup_backend, config).await?;
            let id = dedup.get_new_id().await;
            dedup.disconnect().await;
            status::print_id(id?, format);
            Ok(())
        }
        Commands::Id { dedup: false } => {
            let lock = connect_lock(lock_backend, config).await?;
            let id = lock.get_new_id().await;
            lock.disconnect().await;
            status::print_id(id?, format);
            Ok(())
        }
        Commands::Ping => {
            let lock = connect_lock(lock_backend, config).await?;
            let dedup = connect_dedup(dedup_backend, config).await?;

            let report = status::PingReport {
                stores: vec![
                    status::PingInfo {
                        primitive: "lock",
                        backend: lock.supervisor().backend().name(),
                        collection: config.lock.collection.clone(),
                        state: lock.state(),
                    },
                    status::PingInfo {
                        primitive: "dedup",
                        backend: dedup.supervisor().backend().name(),
                        collection: config.dedup.collection.clone(),
                        state: dedup.state(),
                    },
                ],
            };
            lock.disconnect().await;
            dedup.disconnect().await;
            status::print_ping(&report, format);
            Ok(())
        }
    }
}
