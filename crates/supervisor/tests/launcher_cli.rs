// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Smoke tests for the launcher and service binaries.

// Test code may panic/unwrap/expect
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;

#[test]
fn tcsd_help_lists_common_flags() {
    let output = Command::cargo_bin("tcsd").unwrap().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    for flag in ["--config", "--no-banner", "--no-color", "--launcher", "--terminate-delay"] {
        assert!(stdout.contains(flag), "missing {flag} in help:\n{stdout}");
    }
}

#[test]
fn tcs_service_help_lists_subprocess_flags() {
    let output = Command::cargo_bin("tcs-service").unwrap().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    for flag in ["--runner-id", "--parent-name", "--no-banner"] {
        assert!(stdout.contains(flag), "missing {flag} in help:\n{stdout}");
    }
}

#[test]
fn tcsd_exits_1_on_missing_explicit_config() {
    Command::cargo_bin("tcsd")
        .unwrap()
        .args(["--config", "/definitely/not/here.yaml", "--no-banner"])
        .assert()
        .code(1);
}

#[test]
fn tcs_service_exits_1_on_missing_config() {
    Command::cargo_bin("tcs-service")
        .unwrap()
        .args(["mock_oneshot", "/definitely/not/here.yaml"])
        .assert()
        .code(1);
}

#[test]
fn tcs_service_exits_1_on_dotted_variant() {
    // The variant is validated before any bus connection is attempted.
    let mut config = tempfile::NamedTempFile::new().unwrap();
    use std::io::Write;
    writeln!(config, "services: []").unwrap();

    Command::cargo_bin("tcs-service")
        .unwrap()
        .arg("mock_oneshot")
        .arg(config.path())
        .arg("a.b")
        .arg("--no-banner")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(1);
}
