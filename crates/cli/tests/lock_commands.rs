// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for `turnstile lock`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::json;

#[test]
fn reserve_reports_queue_position() {
    let env = TestEnv::sqlite();

    env.cmd(&["lock", "reserve", "w1", "order-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reserved w1 on order-1 (position 1, owner)"));

    env.cmd(&["lock", "reserve", "w2", "order-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(position 2)"));
}

#[test]
fn list_shows_queue_across_invocations() {
    let env = TestEnv::sqlite();
    for worker in ["w1", "w2", "w3"] {
        env.stdout(&["lock", "reserve", worker, "agg"]);
    }

    similar_asserts::assert_eq!(env.stdout(&["lock", "list", "agg"]), "w1\nw2\nw3\n");
}

#[test]
fn list_json_output() {
    let env = TestEnv::sqlite();
    env.stdout(&["lock", "reserve", "w1", "agg"]);
    env.stdout(&["lock", "reserve", "w2", "agg"]);

    similar_asserts::assert_eq!(
        env.json(&["lock", "list", "agg"]),
        json!({ "aggregate": "agg", "queue": ["w1", "w2"] })
    );
}

#[test]
fn reserving_elsewhere_moves_the_worker() {
    let env = TestEnv::sqlite();
    env.stdout(&["lock", "reserve", "w1", "first"]);
    env.stdout(&["lock", "reserve", "w2", "first"]);
    env.stdout(&["lock", "reserve", "w1", "second"]);

    assert_eq!(env.stdout(&["lock", "list", "first"]), "w2\n");
    assert_eq!(env.stdout(&["lock", "list", "second"]), "w1\n");
}

#[test]
fn resolve_empties_the_queue() {
    let env = TestEnv::sqlite();
    env.stdout(&["lock", "reserve", "w1", "agg"]);

    env.cmd(&["lock", "resolve", "agg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolved agg"));

    env.cmd(&["lock", "list", "agg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No reservations for agg"));
}

#[test]
fn clear_removes_every_queue() {
    let env = TestEnv::sqlite();
    env.stdout(&["lock", "reserve", "w1", "a"]);
    env.stdout(&["lock", "reserve", "w2", "b"]);

    env.stdout(&["lock", "clear"]);

    assert_eq!(env.json(&["lock", "list", "a"])["queue"], json!([]));
    assert_eq!(env.json(&["lock", "list", "b"])["queue"], json!([]));
}

#[test]
fn custom_collections_are_isolated() {
    let env = TestEnv::sqlite();
    let other = TestEnv::with_config(&format!(
        "[backend]\ntype = \"sqlite\"\npath = \"{}\"\n\n[lock]\ncollection = \"otherlocks\"\n",
        env.dir.path().join("coordination.db").display()
    ));

    env.stdout(&["lock", "reserve", "w1", "agg"]);

    assert_eq!(other.json(&["lock", "list", "agg"])["queue"], json!([]));
}

#[test]
fn noop_backend_keeps_nothing() {
    let env = TestEnv::with_config("[backend]\ntype = \"noop\"\n");

    env.cmd(&["lock", "reserve", "w1", "agg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reserved w1 on agg"));
    env.cmd(&["lock", "list", "agg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No reservations"));
}
