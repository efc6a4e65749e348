// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! This module provides enhanced error types that include:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)

use std::fmt;
use std::path::Path;
use turnstile_core::StoreError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct TurnstileError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TurnstileError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    /// Add context about why this error might have happened.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Add a suggestion for how to fix this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Set the source error that caused this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for TurnstileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for TurnstileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Common error builders for typical failure scenarios.
impl TurnstileError {
    /// Error for when the configuration file cannot be used.
    pub fn config_invalid(path: &Path, err: StoreError) -> Self {
        TurnstileError::new(format!("Cannot load configuration from {}", path.display()))
            .with_context(err.to_string())
            .with_suggestion("Check the file is valid TOML with [backend], [lock] and [dedup] sections")
            .with_suggestion("Run without --config to use the built-in defaults")
            .with_source(err)
    }

    /// Error for when a store cannot be reached.
    pub fn store_unreachable(primitive: &str, backend: &str, collection: &str, err: StoreError) -> Self {
        let mut error = TurnstileError::new(format!(
            "Cannot connect the {} to the {} store",
            primitive, backend
        ))
        .with_context(err.to_string())
        .with_context(format!("Collection: {}", collection));

        if backend == "sqlite" {
            error = error
                .with_suggestion("Check the database path in [backend] exists and is writable")
                .with_suggestion("Check no other process holds an exclusive lock on the file");
        }
        error
            .with_suggestion("Re-run with RUST_LOG=debug for connection details")
            .with_source(err)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
