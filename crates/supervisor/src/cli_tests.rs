// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

#[test]
fn tcsd_defaults() {
    let args = TcsdArgs::parse_from(["tcsd"]);
    assert_eq!(args.launcher, LauncherFlavor::InProcess);
    assert_eq!(args.terminate_delay, 1.0);
    assert!(!args.no_banner);
    assert!(!args.no_color);
    assert!(args.config.is_none());
}

#[test]
fn tcsd_process_flavor_with_terminate_delay() {
    let args = TcsdArgs::parse_from([
        "tcsd",
        "--launcher",
        "process",
        "--terminate-delay",
        "2.5",
        "--config",
        "deploy.yaml",
        "--no-banner",
        "--no-color",
    ]);
    assert_eq!(args.launcher, LauncherFlavor::Process);
    assert_eq!(args.terminate_delay, 2.5);
    assert_eq!(args.config.as_deref(), Some(std::path::Path::new("deploy.yaml")));
    assert!(args.no_banner);
    assert!(args.no_color);
}

#[test]
fn tcsd_short_launcher_flag() {
    let args = TcsdArgs::parse_from(["tcsd", "-l", "process"]);
    assert_eq!(args.launcher, LauncherFlavor::Process);
}

#[test]
fn service_args_positionals_and_flags() {
    let args = ServiceArgs::parse_from([
        "tcs-service",
        "mock_permanent",
        "/etc/tcs/services.yaml",
        "t1",
        "--runner-id",
        "launcher.abc.mock_permanent",
        "--parent-name",
        "launcher.abc",
        "--no-banner",
    ]);
    assert_eq!(args.service_type, "mock_permanent");
    assert_eq!(
        args.config_file.as_deref(),
        Some(std::path::Path::new("/etc/tcs/services.yaml"))
    );
    assert_eq!(args.variant.as_deref(), Some("t1"));
    assert_eq!(args.runner_id.as_deref(), Some("launcher.abc.mock_permanent"));
    assert_eq!(args.parent_name.as_deref(), Some("launcher.abc"));
    assert!(args.no_banner);
}

#[test]
fn service_args_minimal() {
    let args = ServiceArgs::parse_from(["tcs-service", "mock_oneshot"]);
    assert_eq!(args.service_type, "mock_oneshot");
    assert!(args.config_file.is_none());
    assert!(args.variant.is_none());
}

#[test]
fn explicit_missing_config_file_is_an_error() {
    let result = determine_config_file(Some(std::path::Path::new("/definitely/not/here.yaml")));
    assert!(result.is_err());
}

#[test]
fn absent_default_config_is_fine() {
    let cwd = std::env::current_dir().unwrap();
    // Only meaningful when the default path is absent in the test cwd.
    if !cwd.join(DEFAULT_CONFIG_FILE).exists() {
        let resolved = determine_config_file(None).unwrap();
        assert!(resolved.is_none());
    }
}
