// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-type to module-path mapping.
//!
//! Configuration format (services.yaml):
//!
//! ```yaml
//! registry:
//!   hello_world: ~                    # -> services.hello_world
//!   examples.minimal: ~               # -> services.examples.minimal
//!   halina.server: halina.server_svc  # external module path
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default module prefix for internal services.
pub const DEFAULT_MODULE_PREFIX: &str = "services";

/// Registry mapping `service_type` to a module path.
///
/// Resolution rules:
/// 1. type registered with a non-empty path: use that path;
/// 2. type registered with a null value: default prefix;
/// 3. type not registered: default prefix (convenience fallback).
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    entries: BTreeMap<String, Option<String>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw configuration mapping's `registry` section.
    pub fn from_config(config: &Map<String, Value>) -> Self {
        let mut entries = BTreeMap::new();
        if let Some(Value::Object(section)) = config.get("registry") {
            for (service_type, value) in section {
                let module = match value {
                    Value::String(path) if !path.is_empty() => Some(path.clone()),
                    _ => None,
                };
                entries.insert(service_type.clone(), module);
            }
        }
        tracing::debug!(entries = entries.len(), "service registry initialized");
        Self { entries }
    }

    pub fn resolve_module(&self, service_type: &str) -> String {
        match self.entries.get(service_type) {
            Some(Some(path)) => path.clone(),
            _ => format!("{DEFAULT_MODULE_PREFIX}.{service_type}"),
        }
    }

    /// True when the type is explicitly registered, even with a null value.
    pub fn has_type(&self, service_type: &str) -> bool {
        self.entries.contains_key(service_type)
    }

    pub fn list_registered_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Mutable only during startup.
    pub fn add_type(&mut self, service_type: impl Into<String>, module_path: Option<String>) {
        self.entries.insert(service_type.into(), module_path);
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
