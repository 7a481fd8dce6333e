// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launchers: build runners from configuration and drive the fleet.
//!
//! Two flavors share this module: the process flavor spawns each service in
//! its own subprocess, the in-process flavor hosts every controller in the
//! launcher's process. Shutdown stops runners in parallel so one wedged
//! service cannot hold the rest hostage.

use crate::policy::RestartSettings;
use crate::runner::{InProcessRunner, ProcessRunner, Runner, RunnerConfig, RunnerStatus};
use futures_util::future::join_all;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tcs_core::{ServiceId, ServiceIdError, Status, DEFAULT_VARIANT};
use tcs_monitor::{BusMonitor, BusMonitorOptions};
use tcs_runtime::{ProcessContext, ServiceCatalog, ServiceRegistry};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("service entry {index} has no 'type' field")]
    MissingServiceType { index: usize },
    #[error("invalid service declaration: {0}")]
    InvalidServiceId(#[from] ServiceIdError),
    #[error("duplicate service id '{0}' in configuration")]
    DuplicateService(String),
}

/// Which runner flavor the launcher builds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LauncherKind {
    /// Every service hosted in the launcher process.
    InProcess,
    /// Each service in its own subprocess.
    Process { terminate_delay: Duration },
}

impl LauncherKind {
    pub fn type_name(self) -> &'static str {
        match self {
            LauncherKind::InProcess => "in-process-launcher",
            LauncherKind::Process { .. } => "process-launcher",
        }
    }
}

/// Deterministic launcher id: `launcher.{hash6}.{host}-{launcher_type}`.
///
/// The hash covers the unique keys (config path, working directory,
/// hostname), so the same deployment gets the same id across restarts.
pub fn launcher_name(launcher_type: &str, unique_keys: &[&str]) -> String {
    let host = crate::runner::hostname();
    let host_short = host.split('.').next().unwrap_or("unknown");

    let combined: Vec<&str> = unique_keys.iter().filter(|k| !k.is_empty()).copied().collect();
    let digest = Sha256::digest(combined.join("|").as_bytes());
    let hash6 = format!("{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2]);

    format!("launcher.{hash6}.{host_short}-{launcher_type}")
}

/// Manages the collection of runners declared in configuration.
pub struct Launcher {
    id: String,
    kind: LauncherKind,
    context: Arc<ProcessContext>,
    subject_prefix: String,
    runners: BTreeMap<String, Arc<dyn Runner>>,
    monitor: Arc<BusMonitor>,
    shutdown_token: CancellationToken,
}

impl Launcher {
    /// Construct runners for each declared service and the launcher-level
    /// monitor. Does not start anything yet.
    pub async fn initialize(
        context: Arc<ProcessContext>,
        kind: LauncherKind,
        id: String,
        catalog: ServiceCatalog,
    ) -> Result<Self, LauncherError> {
        let raw = context.config_manager().raw_config().await;
        let subject_prefix = context.subject_prefix().to_string();
        let registry = ServiceRegistry::from_config(&raw);

        let mut runners: BTreeMap<String, Arc<dyn Runner>> = BTreeMap::new();
        let services = raw.get("services").and_then(Value::as_array).cloned().unwrap_or_default();
        if services.is_empty() {
            tracing::warn!("no services found in configuration");
        }

        for (index, entry) in services.iter().enumerate() {
            let Some(entry) = entry.as_object() else {
                return Err(LauncherError::MissingServiceType { index });
            };
            let Some(service_type) = entry.get("type").and_then(Value::as_str) else {
                return Err(LauncherError::MissingServiceType { index });
            };
            let variant =
                entry.get("variant").and_then(Value::as_str).unwrap_or(DEFAULT_VARIANT);
            let service_id = ServiceId::new(service_type, variant)?;
            let restart = RestartSettings::from_service_entry(entry);

            let runner_config = RunnerConfig {
                service_id: service_id.clone(),
                config_file: context.config_file().map(Into::into),
                runner_id: Some(format!("{id}.{service_type}")),
                parent_name: Some(id.clone()),
                restart: restart.clone(),
            };
            tracing::debug!(
                service_id = %service_id,
                policy = %restart.policy,
                max = restart.max,
                delay_secs = restart.delay.as_secs_f64(),
                "runner registered"
            );

            let runner: Arc<dyn Runner> = match kind {
                LauncherKind::Process { terminate_delay } => Arc::new(ProcessRunner::new(
                    runner_config,
                    context.sink(),
                    &subject_prefix,
                    terminate_delay,
                )),
                LauncherKind::InProcess => Arc::new(InProcessRunner::new(
                    runner_config,
                    Arc::clone(&context),
                    registry.clone(),
                    catalog.clone(),
                    context.sink(),
                    &subject_prefix,
                )),
            };

            if runners.insert(service_id.to_string(), runner).is_some() {
                return Err(LauncherError::DuplicateService(service_id.to_string()));
            }
        }

        let monitor = Arc::new(BusMonitor::new(
            id.clone(),
            context.sink(),
            BusMonitorOptions {
                subject_prefix: subject_prefix.clone(),
                ..BusMonitorOptions::default()
            },
        ));
        monitor.set_status(Status::Startup, Some("Launcher initializing"));

        tracing::info!(launcher_id = %id, runners = runners.len(), "launcher initialized");
        Ok(Self {
            id,
            kind,
            context,
            subject_prefix,
            runners,
            monitor,
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> LauncherKind {
        self.kind
    }

    pub fn subject_prefix(&self) -> &str {
        &self.subject_prefix
    }

    pub fn service_ids(&self) -> Vec<String> {
        self.runners.keys().cloned().collect()
    }

    /// Token cancelled to request an orderly shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Publish `declared` for every runner with a runner id.
    pub async fn declare_services(&self) {
        for runner in self.runners.values() {
            runner.publish_declared().await;
        }
        if !self.runners.is_empty() {
            tracing::info!(count = self.runners.len(), "declared services to registry");
        }
    }

    /// Start all configured services sequentially. Returns false when any
    /// failed; the others keep running.
    pub async fn start_all(&self) -> bool {
        let mut success = true;
        for (service_id, runner) in &self.runners {
            tracing::info!(service_id = %service_id, "starting service");
            match runner.start().await {
                Ok(()) => tracing::info!(service_id = %service_id, "service started"),
                Err(e) => {
                    tracing::error!(service_id = %service_id, error = %e, "failed to start");
                    success = false;
                }
            }
        }

        self.monitor.start_monitoring().await;
        self.monitor.send_registration().await;
        self.monitor.set_status(Status::Ok, Some("Launcher running"));
        success
    }

    /// Stop all running services in parallel.
    pub async fn stop_all(&self) -> bool {
        let stops = self.runners.iter().map(|(service_id, runner)| {
            let service_id = service_id.clone();
            let runner = Arc::clone(runner);
            async move {
                if !runner.is_running() {
                    return true;
                }
                match runner.stop().await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(service_id = %service_id, error = %e, "failed to stop");
                        false
                    }
                }
            }
        });
        join_all(stops).await.into_iter().all(|ok| ok)
    }

    pub async fn start_service(&self, service_id: &str) -> bool {
        match self.runners.get(service_id) {
            Some(runner) => runner.start().await.is_ok(),
            None => {
                tracing::error!(service_id, "service not found");
                false
            }
        }
    }

    pub async fn stop_service(&self, service_id: &str) -> bool {
        match self.runners.get(service_id) {
            Some(runner) => runner.stop().await.is_ok(),
            None => {
                tracing::error!(service_id, "service not found");
                false
            }
        }
    }

    /// Point-in-time status of every runner.
    pub fn statuses(&self) -> BTreeMap<String, RunnerStatus> {
        self.runners
            .iter()
            .map(|(service_id, runner)| (service_id.clone(), runner.status()))
            .collect()
    }

    /// Block until a shutdown signal arrives, then tear everything down.
    pub async fn run(&self) {
        tracing::info!("services started, waiting for shutdown signal");
        tokio::select! {
            _ = crate::signal::shutdown_signal() => {
                tracing::info!("shutdown signal received");
            }
            _ = self.shutdown_token.cancelled() => {
                tracing::info!("shutdown requested");
            }
        }
        self.shutdown().await;
    }

    /// Orderly shutdown: launcher status, monitoring, runners (parallel),
    /// process context.
    pub async fn shutdown(&self) {
        self.monitor.set_status(Status::Shutdown, Some("Launcher shutting down"));
        self.monitor.send_shutdown().await;
        self.monitor.stop_monitoring().await;

        tracing::info!("stopping all services");
        if !self.stop_all().await {
            tracing::warn!("one or more services failed to stop cleanly");
        }

        self.context.shutdown().await;
        tracing::info!(launcher_id = %self.id, "launcher shutdown complete");
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
