// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration pipeline: YAML, env expansion, restart-policy parsing.

use serde_json::Value;
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tcs_config::{ConfigManager, FileSource};
use tcs_core::RestartPolicy;
use tcs_supervisor::RestartSettings;

const DEPLOYMENT_YAML: &str = r#"
nats:
  host: ${TCS_SPEC_NATS_HOST:-localhost}
  port: ${TCS_SPEC_NATS_PORT:-4222}
  subject_prefix: svc
  required: false

registry:
  dome_follower: ~
  guider: guiding.ofp

services:
  - type: dome_follower
    restart: always
    restart_sec: 2.5
    restart_max: 5
    restart_window: 120.0
  - type: guider
    variant: jk15
    exposure: 2.0
  - type: mock_permanent
    variant: t1
    work_interval: 0.5
"#;

async fn load_deployment() -> serde_json::Map<String, Value> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{DEPLOYMENT_YAML}").unwrap();
    let mut manager = ConfigManager::new();
    manager.add_source(Box::new(FileSource::new(file.path())));
    manager.raw_config().await
}

#[tokio::test]
#[serial]
async fn env_default_port_arrives_as_integer() {
    std::env::remove_var("TCS_SPEC_NATS_PORT");
    std::env::remove_var("TCS_SPEC_NATS_HOST");
    let raw = load_deployment().await;
    // The ${VAR:-4222} default must resolve to a number, not a string.
    assert_eq!(raw["nats"]["port"], Value::from(4222));
    assert_eq!(raw["nats"]["host"], "localhost");
}

#[tokio::test]
#[serial]
async fn env_override_wins_over_default() {
    std::env::set_var("TCS_SPEC_NATS_HOST", "nats.oca.lan");
    std::env::set_var("TCS_SPEC_NATS_PORT", "14222");
    let raw = load_deployment().await;
    assert_eq!(raw["nats"]["host"], "nats.oca.lan");
    assert_eq!(raw["nats"]["port"], Value::from(14222));
    std::env::remove_var("TCS_SPEC_NATS_HOST");
    std::env::remove_var("TCS_SPEC_NATS_PORT");
}

#[tokio::test]
#[serial]
async fn declared_restart_fields_parse_into_settings() {
    std::env::remove_var("TCS_SPEC_NATS_PORT");
    let raw = load_deployment().await;
    let services = raw["services"].as_array().unwrap();

    let dome = services[0].as_object().unwrap();
    let settings = RestartSettings::from_service_entry(dome);
    assert_eq!(settings.policy, RestartPolicy::Always);
    assert_eq!(settings.delay, Duration::from_secs_f64(2.5));
    assert_eq!(settings.max, 5);
    assert_eq!(settings.window, Duration::from_secs_f64(120.0));

    // Entries without restart fields get the documented defaults.
    let guider = services[1].as_object().unwrap();
    let defaults = RestartSettings::from_service_entry(guider);
    assert_eq!(defaults, RestartSettings::default());
}

#[tokio::test]
#[serial]
async fn service_scoped_resolution_carries_global_sections() {
    std::env::remove_var("TCS_SPEC_NATS_PORT");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{DEPLOYMENT_YAML}").unwrap();
    let mut manager = ConfigManager::new();
    manager.add_source(Box::new(FileSource::new(file.path())));

    let resolved = manager.resolve_config(Some(("guider", "jk15"))).await;
    assert_eq!(resolved["exposure"], 2.0);
    assert_eq!(resolved["nats"]["subject_prefix"], "svc");
    // The services list itself is not part of a scoped view.
    assert!(!resolved.contains_key("services"));
}
