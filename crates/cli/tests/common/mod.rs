// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A scratch directory holding a config that points at a SQLite store
/// inside it, so state persists between CLI invocations of one test.
pub struct TestEnv {
    pub dir: TempDir,
    pub config: PathBuf,
}

impl TestEnv {
    pub fn sqlite() -> Self {
        Self::with_extra("")
    }

    /// Append extra TOML sections after the backend section
    pub fn with_extra(extra: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let db = dir.path().join("coordination.db");
        let config = dir.path().join("turnstile.toml");
        fs::write(
            &config,
            format!(
                "[backend]\ntype = \"sqlite\"\npath = \"{}\"\n\n{}",
                db.display(),
                extra
            ),
        )
        .expect("Failed to write config");
        Self { dir, config }
    }

    /// Write a config file with exactly this content
    pub fn with_config(content: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config = dir.path().join("turnstile.toml");
        fs::write(&config, content).expect("Failed to write config");
        Self { dir, config }
    }

    /// `turnstile --config <file> <args>`
    pub fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = turnstile();
        cmd.arg("--config").arg(&self.config).args(args);
        cmd
    }

    /// Run and return stdout, asserting success
    pub fn stdout(&self, args: &[&str]) -> String {
        let output = self.cmd(args).output().expect("Failed to run turnstile");
        assert!(
            output.status.success(),
            "turnstile {:?} failed:\n{}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run with `--format json` and parse stdout
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let mut all = vec!["--format", "json"];
        all.extend_from_slice(args);
        serde_json::from_str(&self.stdout(&all)).expect("stdout is not JSON")
    }
}

/// The binary with logging silenced
pub fn turnstile() -> Command {
    let mut cmd = Command::cargo_bin("turnstile").expect("binary not built");
    cmd.env_remove("RUST_LOG");
    cmd
}
