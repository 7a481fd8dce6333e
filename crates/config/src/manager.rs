// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority-ordered merge across configuration sources.

use crate::source::ConfigSource;
use serde_json::{Map, Value};

/// Manages configuration from multiple sources with precedence.
pub struct ConfigManager {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Insert a source, keeping the list sorted from lowest to highest
    /// priority (merge order).
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        tracing::debug!(name = source.name(), priority = source.priority(), "config source added");
        self.sources.push(source);
        self.sources.sort_by_key(|s| s.priority());
    }

    /// Log the active source stack, lowest priority first.
    pub fn log_sources(&self) {
        for source in &self.sources {
            tracing::info!(
                name = source.name(),
                priority = source.priority(),
                available = source.is_available(),
                "config source"
            );
        }
    }

    /// Resolve configuration for one service instance.
    ///
    /// With `service` set, each layer contributes its global sections plus
    /// the matching service-scoped subtree; with `None`, only global
    /// sections are returned.
    pub async fn resolve_config(&self, service: Option<(&str, &str)>) -> Map<String, Value> {
        let mut merged = Map::new();
        for source in &self.sources {
            if !source.is_available() {
                continue;
            }
            let loaded = match source.load().await {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!(name = source.name(), error = %e, "config source failed to load");
                    continue;
                }
            };
            let Value::Object(layer) = loaded else {
                tracing::error!(name = source.name(), "config source did not yield a mapping");
                continue;
            };
            let scoped = extract_service_config(&layer, service);
            if !scoped.is_empty() {
                merge_into(&mut merged, scoped);
                tracing::debug!(name = source.name(), "merged config layer");
            }
        }
        merged
    }

    /// Merged configuration with no service filtering; used by launchers to
    /// read the services list and registry section.
    pub async fn raw_config(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for source in &self.sources {
            if !source.is_available() {
                continue;
            }
            match source.load().await {
                Ok(Value::Object(layer)) => merge_into(&mut merged, layer),
                Ok(_) => {
                    tracing::error!(name = source.name(), "config source did not yield a mapping");
                }
                Err(e) => {
                    tracing::error!(name = source.name(), error = %e, "config source failed to load");
                }
            }
        }
        merged
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep merge: mappings merge recursively, scalars and lists replace.
fn merge_into(base: &mut Map<String, Value>, update: Map<String, Value>) {
    for (key, value) in update {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Pull the subtree for `(service_type, variant)` out of one layer and merge
/// it over that layer's global sections.
///
/// The services section comes in two shapes: a list of entries matched by
/// `type` + `variant`, or a mapping keyed `services.{type}.{variant}`.
fn extract_service_config(
    layer: &Map<String, Value>,
    service: Option<(&str, &str)>,
) -> Map<String, Value> {
    let mut result: Map<String, Value> =
        layer.iter().filter(|(k, _)| k.as_str() != "services").map(|(k, v)| (k.clone(), v.clone())).collect();

    let Some((service_type, variant)) = service else {
        return result;
    };
    let Some(services) = layer.get("services") else {
        return result;
    };

    let scoped = match services {
        Value::Array(entries) => entries.iter().find_map(|entry| {
            let entry = entry.as_object()?;
            let matches_type = entry.get("type").and_then(Value::as_str) == Some(service_type);
            let entry_variant = entry
                .get("variant")
                .and_then(Value::as_str)
                .unwrap_or(tcs_core::DEFAULT_VARIANT);
            if matches_type && entry_variant == variant {
                Some(entry.clone())
            } else {
                None
            }
        }),
        Value::Object(by_type) => by_type.get(service_type).and_then(|per_type| {
            match per_type {
                Value::Object(by_variant) => {
                    by_variant.get(variant).and_then(Value::as_object).cloned()
                }
                _ => None,
            }
        }),
        _ => None,
    };

    if let Some(scoped) = scoped {
        merge_into(&mut result, scoped);
    }
    result
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
