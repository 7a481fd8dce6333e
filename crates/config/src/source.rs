// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration sources and their default priorities.

use crate::expand::expand_env;
use crate::ConfigError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tcs_bus::Bus;

/// Static built-in values.
pub const PRIORITY_DEFAULTS: i32 = 0;
/// YAML file on disk.
pub const PRIORITY_FILE: i32 = 10;
/// Remote configuration subject.
pub const PRIORITY_BUS: i32 = 20;
/// Command-line overrides.
pub const PRIORITY_ARGS: i32 = 30;

/// One layer of configuration. Higher priority overlays lower.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn is_available(&self) -> bool;
    async fn load(&self) -> Result<Value, ConfigError>;
}

/// Static defaults, lowest priority.
pub struct DefaultsSource {
    values: Value,
}

impl DefaultsSource {
    pub fn new(values: Value) -> Self {
        Self { values }
    }
}

#[async_trait]
impl ConfigSource for DefaultsSource {
    fn name(&self) -> &str {
        "defaults"
    }

    fn priority(&self) -> i32 {
        PRIORITY_DEFAULTS
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Value, ConfigError> {
        Ok(self.values.clone())
    }
}

/// YAML file with environment-variable expansion.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn priority(&self) -> i32 {
        PRIORITY_FILE
    }

    fn is_available(&self) -> bool {
        self.path.exists()
    }

    async fn load(&self) -> Result<Value, ConfigError> {
        let path = self.path.display().to_string();
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::Io { path: path.clone(), source: e })?;
        let parsed: Value = serde_yaml::from_str(&text)
            .map_err(|e| ConfigError::Parse { path: path.clone(), source: e })?;
        if parsed.is_null() {
            // Empty file parses to null; treat as an empty mapping.
            return Ok(Value::Object(Map::new()));
        }
        Ok(expand_env(parsed))
    }
}

/// In-memory overlay from parsed command-line arguments.
pub struct ArgsSource {
    values: Value,
}

impl ArgsSource {
    pub fn new(values: Value) -> Self {
        Self { values }
    }
}

#[async_trait]
impl ConfigSource for ArgsSource {
    fn name(&self) -> &str {
        "args"
    }

    fn priority(&self) -> i32 {
        PRIORITY_ARGS
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Value, ConfigError> {
        Ok(self.values.clone())
    }
}

/// Remote configuration fetched over the bus with request/reply.
///
/// Best-effort: an unreachable responder yields an empty layer rather than
/// an error, so startup never hangs on optional remote config.
pub struct BusSource {
    subject: String,
    bus: Arc<Bus>,
}

impl BusSource {
    pub fn new(subject: impl Into<String>, bus: Arc<Bus>) -> Self {
        Self { subject: subject.into(), bus }
    }
}

const BUS_CONFIG_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
impl ConfigSource for BusSource {
    fn name(&self) -> &str {
        "bus"
    }

    fn priority(&self) -> i32 {
        PRIORITY_BUS
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Value, ConfigError> {
        let request = self.bus.client().request(self.subject.clone(), "".into());
        match tokio::time::timeout(BUS_CONFIG_TIMEOUT, request).await {
            Ok(Ok(reply)) => match serde_json::from_slice::<Value>(&reply.payload) {
                Ok(value) => Ok(value),
                Err(e) => {
                    tracing::warn!(subject = %self.subject, error = %e, "malformed remote config");
                    Ok(Value::Object(Map::new()))
                }
            },
            Ok(Err(e)) => {
                tracing::debug!(subject = %self.subject, error = %e, "remote config request failed");
                Ok(Value::Object(Map::new()))
            }
            Err(_) => {
                tracing::debug!(subject = %self.subject, "remote config request timed out");
                Ok(Value::Object(Map::new()))
            }
        }
    }
}
