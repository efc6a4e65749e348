// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `turnstile lock` - Reservation queue commands

use crate::output::{self, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use turnstile_coordination::DistributedLock;
use turnstile_core::{StorageBackend, WorkerId};

#[derive(Args)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommand,
}

#[derive(Subcommand)]
pub enum LockCommand {
    /// Queue a worker on an aggregate, replacing its previous reservation
    Reserve {
        /// Worker id
        worker: String,
        /// Aggregate id
        aggregate: String,
    },
    /// Show an aggregate's queue, lock holder first
    List {
        /// Aggregate id
        aggregate: String,
    },
    /// Drop an aggregate's whole queue
    Resolve {
        /// Aggregate id
        aggregate: String,
    },
    /// Remove every reservation (maintenance)
    Clear,
}

#[derive(Serialize)]
struct ReserveInfo {
    worker: WorkerId,
    aggregate: String,
    /// 1-based queue position; absent if the reservation is already gone
    position: Option<usize>,
    owner: bool,
}

impl fmt::Display for ReserveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reserved {} on {}", self.worker, self.aggregate)?;
        match self.position {
            Some(1) => write!(f, " (position 1, owner)"),
            Some(position) => write!(f, " (position {})", position),
            None => Ok(()),
        }
    }
}

#[derive(Serialize)]
struct QueueInfo {
    aggregate: String,
    queue: Vec<WorkerId>,
}

impl fmt::Display for QueueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.queue.is_empty() {
            return write!(f, "No reservations for {}", self.aggregate);
        }
        for (i, worker) in self.queue.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", worker)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Done {
    message: String,
}

impl fmt::Display for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub async fn handle<B: StorageBackend>(
    command: LockCommand,
    lock: &DistributedLock<B>,
    format: OutputFormat,
) -> Result<()> {
    match command {
        LockCommand::Reserve { worker, aggregate } => {
            let worker = WorkerId::new(worker);
            lock.reserve(&worker, &aggregate).await?;

            let queue = lock.get_all(&aggregate).await?;
            let position = queue.iter().position(|w| w == &worker).map(|i| i + 1);
            output::print(
                &ReserveInfo {
                    worker,
                    aggregate,
                    position,
                    owner: position == Some(1),
                },
                format,
            );
        }
        LockCommand::List { aggregate } => {
            let queue = lock.get_all(&aggregate).await?;
            output::print(&QueueInfo { aggregate, queue }, format);
        }
        LockCommand::Resolve { aggregate } => {
            lock.resolve(&aggregate).await?;
            output::print(
                &Done {
                    message: format!("Resolved {}", aggregate),
                },
                format,
            );
        }
        LockCommand::Clear => {
            lock.clear().await?;
            output::print(
                &Done {
                    message: "Cleared all reservations".to_string(),
                },
                format,
            );
        }
    }
    Ok(())
}
