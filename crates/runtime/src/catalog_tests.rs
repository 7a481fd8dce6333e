// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[derive(Debug, serde::Deserialize)]
struct ProbeConfig {
    #[serde(default = "default_interval")]
    interval: f64,
    #[serde(default)]
    label: String,
}

fn default_interval() -> f64 {
    1.0
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { interval: default_interval(), label: String::new() }
    }
}

impl ServiceConfig for ProbeConfig {
    const FIELDS: &'static [&'static str] = &["interval", "label"];
}

fn resolved(value: serde_json::Value) -> Map<String, Value> {
    let Value::Object(map) = value else { unreachable!() };
    map
}

#[test]
fn binding_projects_known_fields() {
    let config: ProbeConfig =
        bind_config(&resolved(json!({"interval": 2.5, "label": "west"}))).unwrap();
    assert_eq!(config.interval, 2.5);
    assert_eq!(config.label, "west");
}

#[test]
fn unknown_fields_are_dropped_not_rejected() {
    let config: ProbeConfig = bind_config(&resolved(json!({
        "interval": 2.0,
        "type": "probe",
        "variant": "dev",
        "restart": "always",
        "nats": {"host": "localhost"},
    })))
    .unwrap();
    assert_eq!(config.interval, 2.0);
}

#[test]
fn missing_fields_use_defaults() {
    let config: ProbeConfig = bind_config(&Map::new()).unwrap();
    assert_eq!(config.interval, 1.0);
    assert_eq!(config.label, "");
}

#[test]
fn wrong_type_is_a_binding_error() {
    let result: Result<ProbeConfig, _> = bind_config(&resolved(json!({"interval": "soon"})));
    assert!(matches!(result, Err(ControllerError::ConfigBinding(_))));
}

#[test]
fn builtin_catalog_contains_mock_services() {
    let catalog = ServiceCatalog::builtin();
    for service_type in ["mock_permanent", "mock_crashing", "mock_hanging", "mock_oneshot"] {
        assert!(catalog.get(service_type).is_some(), "missing {service_type}");
    }
    assert!(catalog.get("nonexistent").is_none());
}
