// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `turnstile id` and `turnstile ping`

use crate::output::{self, OutputFormat};
use serde::Serialize;
use std::fmt;
use turnstile_core::ConnectionState;

#[derive(Serialize)]
pub struct IdInfo {
    pub id: String,
}

impl fmt::Display for IdInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Connectivity of one primitive
#[derive(Serialize)]
pub struct PingInfo {
    pub primitive: &'static str,
    pub backend: &'static str,
    pub collection: String,
    pub state: ConnectionState,
}

impl fmt::Display for PingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({}, {})",
            self.primitive, self.state, self.backend, self.collection
        )
    }
}

#[derive(Serialize)]
pub struct PingReport {
    pub stores: Vec<PingInfo>,
}

impl fmt::Display for PingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, store) in self.stores.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", store)?;
        }
        Ok(())
    }
}

pub fn print_id(id: String, format: OutputFormat) {
    output::print(&IdInfo { id }, format);
}

pub fn print_ping(report: &PingReport, format: OutputFormat) {
    output::print(report, format);
}
