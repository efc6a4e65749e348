// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn display_lists_context_and_numbered_suggestions() {
    let err = TurnstileError::new("Something broke")
        .with_context("first reason")
        .with_suggestion("try this")
        .with_suggestion("then that");

    let rendered = err.to_string();
    assert!(rendered.starts_with("error: Something broke\n"));
    assert!(rendered.contains("  -> first reason"));
    assert!(rendered.contains("  1. try this"));
    assert!(rendered.contains("  2. then that"));
}

#[test]
fn sqlite_unreachable_suggests_checking_path() {
    let err = TurnstileError::store_unreachable(
        "lock",
        "sqlite",
        "aggregatelock",
        StoreError::connection("sqlite", "unable to open database file"),
    );

    let rendered = err.to_string();
    assert!(rendered.contains("Cannot connect the lock to the sqlite store"));
    assert!(rendered.contains("unable to open database file"));
    assert!(rendered.contains("database path"));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn config_invalid_names_the_file() {
    let err = TurnstileError::config_invalid(
        Path::new("/etc/turnstile.toml"),
        StoreError::Config("invalid TOML".to_string()),
    );

    assert!(err.to_string().contains("/etc/turnstile.toml"));
}
