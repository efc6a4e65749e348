// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for help, configuration and connectivity

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use common::{turnstile, TestEnv};
use predicates::prelude::*;
use serde_json::json;

#[test]
fn help_lists_commands() {
    turnstile()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("lock"))
        .stdout(predicate::str::contains("dedup"))
        .stdout(predicate::str::contains("ping"));
}

#[test]
fn version_prints_name() {
    turnstile()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("turnstile"));
}

#[test]
fn ping_reports_both_stores() {
    let env = TestEnv::sqlite();

    env.cmd(&["ping"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "lock: connected (sqlite, aggregatelock)",
        ))
        .stdout(predicate::str::contains(
            "dedup: connected (sqlite, commandbumper)",
        ));
}

#[test]
fn ping_json_output() {
    let env = TestEnv::sqlite();

    let report = env.json(&["ping"]);
    similar_asserts::assert_eq!(
        report["stores"][0],
        json!({
            "primitive": "lock",
            "backend": "sqlite",
            "collection": "aggregatelock",
            "state": "connected"
        })
    );
}

#[test]
fn memory_backend_is_per_invocation() {
    let env = TestEnv::with_config("[backend]\ntype = \"memory\"\n");

    assert_eq!(env.stdout(&["dedup", "add", "cmd"]), "added\n");
    assert_eq!(env.stdout(&["dedup", "add", "cmd"]), "added\n");
}

#[test]
fn missing_explicit_config_fails_with_suggestions() {
    turnstile()
        .args(["--config", "/nonexistent/turnstile.toml", "ping"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot load configuration"))
        .stderr(predicate::str::contains("suggestions:"));
}

#[test]
fn invalid_collection_is_rejected() {
    let env = TestEnv::with_config("[lock]\ncollection = \"bad-name\"\n");

    env.cmd(&["lock", "list", "agg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ASCII identifier"));
}

#[test]
fn unreachable_sqlite_store_is_explained() {
    let env = TestEnv::with_config(
        "[backend]\ntype = \"sqlite\"\npath = \"/nonexistent/dir/coordination.db\"\n",
    );

    env.cmd(&["lock", "list", "agg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Cannot connect the lock to the sqlite store",
        ))
        .stderr(predicate::str::contains("database path"));
}
