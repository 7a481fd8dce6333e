// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit registration table for compiled-in services.
//!
//! The original decorator-style self-registration becomes a table populated
//! at startup: each service type maps to a factory that binds the resolved
//! configuration and constructs the implementation. The table is mutable
//! only while the process is wiring itself up.

use crate::controller::ControllerError;
use crate::service::Service;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Typed service configuration with a known-fields set.
///
/// The binder projects the resolved mapping onto `FIELDS`; unknown keys are
/// dropped with a debug log, never an error.
pub trait ServiceConfig: DeserializeOwned + Default {
    const FIELDS: &'static [&'static str];
}

/// Minimal config for services that declare none.
#[derive(Debug, Default, serde::Deserialize)]
pub struct BaseServiceConfig {}

impl ServiceConfig for BaseServiceConfig {
    const FIELDS: &'static [&'static str] = &[];
}

/// Project a resolved config mapping onto a config type's known fields.
pub fn bind_config<C: ServiceConfig>(resolved: &Map<String, Value>) -> Result<C, ControllerError> {
    let mut projected = Map::new();
    let mut dropped = Vec::new();
    for (key, value) in resolved {
        if C::FIELDS.contains(&key.as_str()) {
            projected.insert(key.clone(), value.clone());
        } else {
            dropped.push(key.as_str());
        }
    }
    if !dropped.is_empty() {
        tracing::debug!(fields = ?dropped, "dropping config fields the service does not accept");
    }
    serde_json::from_value(Value::Object(projected))
        .map_err(|e| ControllerError::ConfigBinding(e.to_string()))
}

/// Factory constructing a service from its resolved configuration.
pub type ServiceFactory =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Box<dyn Service>, ControllerError> + Send + Sync>;

/// Registration table: service type -> factory.
#[derive(Clone, Default)]
pub struct ServiceCatalog {
    entries: BTreeMap<String, ServiceFactory>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-populated with the built-in services.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        crate::services::register_builtin(&mut catalog);
        catalog
    }

    pub fn register<F>(&mut self, service_type: impl Into<String>, factory: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Box<dyn Service>, ControllerError>
            + Send
            + Sync
            + 'static,
    {
        let service_type = service_type.into();
        tracing::debug!(service_type = %service_type, "service registered");
        self.entries.insert(service_type, Arc::new(factory));
    }

    pub fn get(&self, service_type: &str) -> Option<ServiceFactory> {
        self.entries.get(service_type).cloned()
    }

    pub fn service_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
