// File: cli_tests.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn wafprobe() -> Command {
    Command::cargo_bin("wafprobe").unwrap()
}

#[test]
fn missing_target_fails() {
    wafprobe().assert().failure();
}

#[test]
fn missing_sample_directory_exits_nonzero() {
    wafprobe()
        .args(["-t", "http://127.0.0.1", "-d", "/nonexistent/sample/dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn invalid_timeout_string_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    wafprobe()
        .args(["-t", "http://127.0.0.1"])
        .args(["-d", dir.path().to_str().unwrap()])
        .args(["--timeout", "ten,thirty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timeout"));
}

#[test]
fn invalid_loss_rate_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    wafprobe()
        .args(["-t", "http://127.0.0.1"])
        .args(["-d", dir.path().to_str().unwrap()])
        .args(["--loss-rate", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loss rate"));
}

#[test]
fn unparsable_target_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    wafprobe()
        .args(["-t", "http://:8080"])
        .args(["-d", dir.path().to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn empty_sample_directory_exits_zero() {
    let dir = TempDir::new().unwrap();
    wafprobe()
        .args(["-t", "http://127.0.0.1:1"])
        .args(["-d", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total samples: 0"));
}

#[test]
fn sample_mismatches_still_exit_zero() {
    // Nothing listens on this port: the black sample cannot be blocked,
    // which is a mismatch but not a process failure.
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("probe.black"),
        "GET /attack HTTP/1.1\nHost: waf.test\n\n",
    )
    .unwrap();

    wafprobe()
        .args(["-t", "http://127.0.0.1:1"])
        .args(["-d", dir.path().to_str().unwrap()])
        .args(["--max-retries", "1", "--timeout", "1,1", "--debug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Detection rate: 0.0%"));
}
