// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process context: bus connection, configuration, controller registry.
//!
//! One context exists per process, created by the first `initialize` call;
//! later calls return the existing instance. The context closes only bus
//! connections it opened itself; discovered connections are adopted un-owned
//! and survive shutdown.

use crate::controller::ServiceController;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tcs_bus::subjects::DEFAULT_PREFIX;
use tcs_bus::{Bus, MessageSink};
use tcs_config::{ArgsSource, BusSource, ConfigManager, FileSource};
use thiserror::Error;

/// Timeout used when the bus is optional.
const OPTIONAL_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid NATS port value '{0}': must be an integer")]
    InvalidPort(String),
    #[error("NATS is required but the connection failed: {0}")]
    BusRequired(String),
}

/// Inputs to context initialization.
#[derive(Debug, Default)]
pub struct ContextOptions {
    pub config_file: Option<PathBuf>,
    /// Command-line overlay, highest-priority configuration layer.
    pub args_overlay: Option<Value>,
}

static INSTANCE: Mutex<Option<Arc<ProcessContext>>> = Mutex::new(None);
static INIT_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Shared process-wide resources.
pub struct ProcessContext {
    config_manager: ConfigManager,
    config_file: Option<PathBuf>,
    bus: Option<Arc<Bus>>,
    owns_bus: bool,
    subject_prefix: String,
    controllers: Mutex<HashMap<String, Arc<ServiceController>>>,
    config_cache: Mutex<HashMap<String, Value>>,
}

struct NatsSettings {
    host: String,
    port: u16,
    subject_prefix: String,
    required: bool,
    config_subject: Option<String>,
    /// True when the configuration declared a bus endpoint.
    declared: bool,
}

fn parse_port(value: &Value) -> Result<u16, ContextError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| ContextError::InvalidPort(value.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<u16>()
            .map_err(|_| ContextError::InvalidPort(s.clone())),
        other => Err(ContextError::InvalidPort(other.to_string())),
    }
}

fn parse_nats_settings(section: Option<&Map<String, Value>>) -> Result<NatsSettings, ContextError> {
    let empty = Map::new();
    let section = section.unwrap_or(&empty);

    let host = section
        .get("host")
        .and_then(Value::as_str)
        .unwrap_or(tcs_bus::DEFAULT_HOST)
        .to_string();
    let port = match section.get("port") {
        Some(value) => parse_port(value)?,
        None => tcs_bus::DEFAULT_PORT,
    };
    let subject_prefix = section
        .get("subject_prefix")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PREFIX)
        .to_string();
    let required = section.get("required").and_then(Value::as_bool).unwrap_or(true);
    let config_subject = section
        .get("config_subject")
        .and_then(Value::as_str)
        .map(str::to_string);
    let declared = section.contains_key("host") || section.contains_key("port");

    Ok(NatsSettings { host, port, subject_prefix, required, config_subject, declared })
}

/// Bus endpoint from `NATS_HOST` / `NATS_PORT`, falling back to defaults.
/// A malformed port in the environment is downgraded, not fatal.
fn env_endpoint() -> (String, u16) {
    let host = std::env::var("NATS_HOST").unwrap_or_else(|_| tcs_bus::DEFAULT_HOST.to_string());
    let port = match std::env::var("NATS_PORT") {
        Ok(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "invalid NATS_PORT, using {}", tcs_bus::DEFAULT_PORT);
            tcs_bus::DEFAULT_PORT
        }),
        Err(_) => tcs_bus::DEFAULT_PORT,
    };
    (host, port)
}

impl ProcessContext {
    /// Initialize process-wide resources. Call once per OS process; later
    /// calls return the existing instance.
    pub async fn initialize(options: ContextOptions) -> Result<Arc<ProcessContext>, ContextError> {
        let _guard = INIT_LOCK.lock().await;
        if let Some(existing) = INSTANCE.lock().clone() {
            return Ok(existing);
        }

        let mut config_manager = ConfigManager::new();
        if let Some(path) = &options.config_file {
            config_manager.add_source(Box::new(FileSource::new(path)));
        }
        if let Some(args) = options.args_overlay.clone() {
            config_manager.add_source(Box::new(ArgsSource::new(args)));
        }

        let global = config_manager.resolve_config(None).await;
        let nats_section = global.get("nats").and_then(Value::as_object);
        let settings = parse_nats_settings(nats_section)?;

        let (bus, owns_bus) = Self::resolve_bus(&settings).await?;

        if let Some(bus) = &bus {
            if owns_bus {
                tcs_bus::shared::install(Arc::clone(bus));
            }
            if let Err(e) = bus.ensure_streams(&settings.subject_prefix).await {
                tracing::warn!(error = %e, "stream provisioning failed, publishers may degrade");
            }
            if let Some(subject) = &settings.config_subject {
                config_manager.add_source(Box::new(BusSource::new(subject, Arc::clone(bus))));
                tracing::debug!(subject = %subject, "bus config source added");
            }
        }

        config_manager.log_sources();

        let context = Arc::new(ProcessContext {
            config_manager,
            config_file: options.config_file,
            bus,
            owns_bus,
            subject_prefix: settings.subject_prefix,
            controllers: Mutex::new(HashMap::new()),
            config_cache: Mutex::new(HashMap::new()),
        });
        *INSTANCE.lock() = Some(Arc::clone(&context));
        tracing::info!(
            bus = context.bus.is_some(),
            owned = context.owns_bus,
            prefix = %context.subject_prefix,
            "process context initialized"
        );
        Ok(context)
    }

    async fn resolve_bus(settings: &NatsSettings) -> Result<(Option<Arc<Bus>>, bool), ContextError> {
        if settings.declared {
            if settings.required {
                let bus = Bus::connect_required(&settings.host, settings.port).await;
                return Ok((Some(Arc::new(bus)), true));
            }
            return match Bus::connect(&settings.host, settings.port, OPTIONAL_CONNECT_TIMEOUT).await
            {
                Ok(bus) => Ok((Some(Arc::new(bus)), true)),
                Err(e) => {
                    tracing::warn!(error = %e, "optional bus unreachable, continuing without it");
                    Ok((None, false))
                }
            };
        }

        // No bus declared: adopt an externally managed connection if one was
        // installed, otherwise try the environment/default endpoint.
        if let Some(bus) = tcs_bus::shared::discover() {
            tracing::info!("discovered externally managed bus connection (not owned)");
            return Ok((Some(bus), false));
        }

        let (host, port) = env_endpoint();
        match Bus::connect(&host, port, OPTIONAL_CONNECT_TIMEOUT).await {
            Ok(bus) => Ok((Some(Arc::new(bus)), true)),
            Err(e) => {
                tracing::warn!(host = %host, port, error = %e, "no bus reachable, monitoring disabled");
                Ok((None, false))
            }
        }
    }

    /// The current context, if one was initialized.
    pub fn current() -> Option<Arc<ProcessContext>> {
        INSTANCE.lock().clone()
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    pub fn bus(&self) -> Option<Arc<Bus>> {
        self.bus.clone()
    }

    /// Bus as a publishing sink, when connected.
    pub fn sink(&self) -> Option<Arc<dyn MessageSink>> {
        self.bus.clone().map(|bus| bus as Arc<dyn MessageSink>)
    }

    pub fn owns_bus(&self) -> bool {
        self.owns_bus
    }

    pub fn subject_prefix(&self) -> &str {
        &self.subject_prefix
    }

    pub fn register_controller(&self, controller: Arc<ServiceController>) {
        let key = controller.registry_key();
        self.controllers.lock().insert(key.clone(), controller);
        tracing::debug!(key = %key, "controller registered");
    }

    pub fn unregister_controller(&self, key: &str) {
        if self.controllers.lock().remove(key).is_some() {
            tracing::debug!(key, "controller unregistered");
        }
    }

    pub fn controller(&self, module_name: &str, instance_id: &str) -> Option<Arc<ServiceController>> {
        self.controllers.lock().get(&format!("{module_name}:{instance_id}")).cloned()
    }

    pub fn cache_config(&self, key: impl Into<String>, config: Value) {
        self.config_cache.lock().insert(key.into(), config);
    }

    pub fn cached_config(&self, key: &str) -> Option<Value> {
        self.config_cache.lock().get(key).cloned()
    }

    pub fn clear_config_cache(&self) {
        self.config_cache.lock().clear();
    }

    /// Shut down registered controllers, release the bus if owned, and clear
    /// the process singleton so a later initialize starts fresh.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down process context");

        let controllers: Vec<Arc<ServiceController>> =
            self.controllers.lock().values().cloned().collect();
        for controller in controllers {
            if let Err(e) = controller.shutdown().await {
                tracing::error!(key = %controller.registry_key(), error = %e, "controller shutdown failed");
            }
        }

        if let Some(bus) = &self.bus {
            if self.owns_bus {
                if let Some(shared) = tcs_bus::shared::discover() {
                    if Arc::ptr_eq(&shared, bus) {
                        tcs_bus::shared::clear();
                    }
                }
                bus.close().await;
                tracing::info!("closed owned bus connection");
            } else {
                tracing::debug!("bus connection not owned, leaving it open");
            }
        }

        {
            let mut instance = INSTANCE.lock();
            if instance.as_ref().is_some_and(|current| std::ptr::eq(current.as_ref(), self)) {
                *instance = None;
            }
        }
        tracing::info!("process context shutdown complete");
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
