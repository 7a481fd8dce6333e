// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runners: the authority on one service's lifecycle.
//!
//! A runner is the sole publisher on `{prefix}.registry.*.{service_id}`.
//! Runners without a `runner_id` (ad-hoc/ephemeral runs) publish nothing.

mod in_process;
mod process;

pub use in_process::InProcessRunner;
pub use process::{ProcessRunner, SERVICE_BINARY_ENV};

use crate::policy::RestartSettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tcs_bus::MessageSink;
use tcs_core::{RegistryEvent, ServiceId, Status, UtcTimestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("service {0} already running")]
    AlreadyRunning(String),
    #[error("service {0} not running")]
    NotRunning(String),
    #[error("failed to spawn {service_id}: {message}")]
    SpawnFailed { service_id: String, message: String },
    #[error("controller error for {service_id}: {message}")]
    Controller { service_id: String, message: String },
}

/// Static configuration of one runner, immutable for a launcher run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub service_id: ServiceId,
    pub config_file: Option<PathBuf>,
    /// Stable identity within a launcher; absent for ephemeral runs.
    pub runner_id: Option<String>,
    /// Display-grouping hint, usually the launcher id.
    pub parent_name: Option<String>,
    pub restart: RestartSettings,
}

/// Point-in-time view of a runner.
#[derive(Debug, Clone)]
pub struct RunnerStatus {
    pub service_id: String,
    pub running: bool,
    pub pid: Option<u32>,
    pub start_time: Option<DateTime<Utc>>,
    pub uptime_seconds: Option<f64>,
}

/// One supervised service.
#[async_trait]
pub trait Runner: Send + Sync {
    fn config(&self) -> &RunnerConfig;
    fn is_running(&self) -> bool;
    async fn start(&self) -> Result<(), RunnerError>;
    async fn stop(&self) -> Result<(), RunnerError>;
    async fn restart(&self) -> Result<(), RunnerError>;
    fn status(&self) -> RunnerStatus;
    /// Publish the `declared` event; a no-op without a runner id.
    async fn publish_declared(&self);
}

/// Serializes registry-event emission for one service id.
///
/// Publication is best-effort: failures are logged and swallowed so a flaky
/// bus never takes down the runner.
pub struct EventPublisher {
    sink: Option<Arc<dyn MessageSink>>,
    prefix: String,
    service_id: String,
    runner_id: Option<String>,
    parent: Option<String>,
    restart_policy: tcs_core::RestartPolicy,
}

impl EventPublisher {
    pub fn new(
        sink: Option<Arc<dyn MessageSink>>,
        prefix: impl Into<String>,
        config: &RunnerConfig,
    ) -> Self {
        Self {
            sink,
            prefix: prefix.into(),
            service_id: config.service_id.to_string(),
            runner_id: config.runner_id.clone(),
            parent: config.parent_name.clone(),
            restart_policy: config.restart.policy,
        }
    }

    async fn publish(&self, event: RegistryEvent) {
        if self.runner_id.is_none() {
            tracing::debug!(
                service_id = %self.service_id,
                event = event.kind(),
                "no runner_id, event not published"
            );
            return;
        }
        let Some(sink) = &self.sink else {
            tracing::debug!(service_id = %self.service_id, event = event.kind(), "no bus, event not published");
            return;
        };
        let subject = event.subject(&self.prefix);
        match serde_json::to_value(&event) {
            Ok(payload) => {
                if let Err(e) = sink.publish(subject.clone(), payload).await {
                    tracing::error!(subject = %subject, error = %e, "event publish failed");
                } else {
                    tracing::info!(service_id = %self.service_id, event = event.kind(), "event published");
                }
            }
            Err(e) => tracing::error!(error = %e, "event serialization failed"),
        }
    }

    pub async fn declared(&self) {
        self.publish(RegistryEvent::Declared {
            service_id: self.service_id.clone(),
            timestamp: UtcTimestamp::now(),
            parent: self.parent.clone(),
            runner_id: self.runner_id.clone(),
            restart_policy: self.restart_policy,
        })
        .await;
    }

    pub async fn start(&self, pid: u32) {
        self.publish(RegistryEvent::Start {
            service_id: self.service_id.clone(),
            timestamp: UtcTimestamp::now(),
            parent: self.parent.clone(),
            runner_id: self.runner_id.clone(),
            status: Status::Startup,
            hostname: hostname(),
            pid,
        })
        .await;
    }

    pub async fn stop(&self, reason: &str, exit_code: i32) {
        self.publish(RegistryEvent::Stop {
            service_id: self.service_id.clone(),
            timestamp: UtcTimestamp::now(),
            parent: self.parent.clone(),
            runner_id: self.runner_id.clone(),
            status: Status::Shutdown,
            reason: reason.to_string(),
            exit_code,
        })
        .await;
    }

    pub async fn crashed(&self, exit_code: i32, will_restart: bool) {
        self.publish(RegistryEvent::Crashed {
            service_id: self.service_id.clone(),
            timestamp: UtcTimestamp::now(),
            parent: self.parent.clone(),
            runner_id: self.runner_id.clone(),
            status: if will_restart { Status::Error } else { Status::Failed },
            exit_code,
            restart_policy: self.restart_policy,
            will_restart,
        })
        .await;
    }

    pub async fn restarting(&self, attempt: u32, max_restarts: Option<u32>) {
        self.publish(RegistryEvent::Restarting {
            service_id: self.service_id.clone(),
            timestamp: UtcTimestamp::now(),
            parent: self.parent.clone(),
            runner_id: self.runner_id.clone(),
            status: Status::Startup,
            restart_attempt: attempt,
            max_restarts,
        })
        .await;
    }

    pub async fn failed(&self, reason: &str, restart_count: u32) {
        self.publish(RegistryEvent::Failed {
            service_id: self.service_id.clone(),
            timestamp: UtcTimestamp::now(),
            parent: self.parent.clone(),
            runner_id: self.runner_id.clone(),
            status: Status::Failed,
            reason: reason.to_string(),
            restart_count,
        })
        .await;
    }
}

pub(crate) fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
