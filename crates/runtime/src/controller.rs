// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process owner of one service instance.
//!
//! The controller discovers the implementation in the catalog, binds the
//! resolved configuration, wires monitoring, and drives start/stop. It holds
//! only a weak reference to the process context; the context owns the
//! controllers, not the other way around.

use crate::catalog::{ServiceCatalog, ServiceFactory};
use crate::context::ProcessContext;
use crate::registry::ServiceRegistry;
use crate::service::{ServiceContext, ServiceError, ServiceOutcome};
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tcs_core::{ServiceId, Status};
use tcs_monitor::{BusMonitor, BusMonitorOptions};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a stop waits for the service task before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no service class registered for type '{service_type}' (module '{module}')")]
    UnknownService { service_type: String, module: String },
    #[error("controller not initialized")]
    NotInitialized,
    #[error("config binding failed: {0}")]
    ConfigBinding(String),
    #[error("service start failed: {0}")]
    StartFailed(#[source] ServiceError),
}

struct CtrlState {
    initialized: bool,
    running: bool,
    shut_down: bool,
    resolved: Map<String, Value>,
    factory: Option<ServiceFactory>,
    token: Option<CancellationToken>,
    run_task: Option<JoinHandle<()>>,
}

/// Controls a single service in the same process.
pub struct ServiceController {
    module_name: String,
    service_id: ServiceId,
    monitor: Arc<BusMonitor>,
    context: Weak<ProcessContext>,
    catalog: ServiceCatalog,
    state: tokio::sync::Mutex<CtrlState>,
    result: Arc<parking_lot::Mutex<Option<Result<ServiceOutcome, ServiceError>>>>,
    completed: Arc<Notify>,
}

impl ServiceController {
    /// Create a controller and register it with the process context.
    pub fn create(
        context: &Arc<ProcessContext>,
        registry: &ServiceRegistry,
        catalog: ServiceCatalog,
        service_id: ServiceId,
        runner_id: Option<String>,
        parent_name: Option<String>,
    ) -> Arc<Self> {
        let module_name = registry.resolve_module(service_id.service_type());
        let monitor = Arc::new(BusMonitor::new(
            service_id.to_string(),
            context.sink(),
            BusMonitorOptions {
                subject_prefix: context.subject_prefix().to_string(),
                parent_name,
                runner_id,
                ..BusMonitorOptions::default()
            },
        ));

        let controller = Arc::new(Self {
            module_name,
            service_id,
            monitor,
            context: Arc::downgrade(context),
            catalog,
            state: tokio::sync::Mutex::new(CtrlState {
                initialized: false,
                running: false,
                shut_down: false,
                resolved: Map::new(),
                factory: None,
                token: None,
                run_task: None,
            }),
            result: Arc::new(parking_lot::Mutex::new(None)),
            completed: Arc::new(Notify::new()),
        });
        context.register_controller(Arc::clone(&controller));
        tracing::info!(service_id = %controller.service_id, "controller created");
        controller
    }

    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Key under which this controller is registered with the context.
    pub fn registry_key(&self) -> String {
        format!("{}:{}", self.module_name, self.service_id.variant())
    }

    pub fn monitor(&self) -> &Arc<BusMonitor> {
        &self.monitor
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Discover the service class, resolve configuration, start monitoring.
    pub async fn initialize(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        if state.initialized {
            return Ok(());
        }

        let service_type = self.service_id.service_type();
        let Some(factory) = self.catalog.get(service_type) else {
            let error = ControllerError::UnknownService {
                service_type: service_type.to_string(),
                module: self.module_name.clone(),
            };
            self.monitor.set_status(Status::Failed, Some(&error.to_string()));
            return Err(error);
        };

        state.resolved = match self.context.upgrade() {
            Some(context) => {
                context
                    .config_manager()
                    .resolve_config(Some((service_type, self.service_id.variant())))
                    .await
            }
            None => Map::new(),
        };
        state.factory = Some(factory);

        self.monitor.start_monitoring().await;
        self.monitor.set_status(Status::Startup, Some("Initializing controller"));
        self.monitor.send_registration().await;

        state.initialized = true;
        tracing::info!(service_id = %self.service_id, "controller initialized");
        Ok(())
    }

    /// Create the service instance and run its lifecycle.
    pub async fn start_service(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(ControllerError::NotInitialized);
        }
        if state.running {
            tracing::warn!(service_id = %self.service_id, "service already running");
            return Ok(());
        }

        self.monitor.set_status(Status::Startup, Some("Starting service"));
        let factory = state.factory.clone().ok_or(ControllerError::NotInitialized)?;
        let mut service = match factory(&state.resolved) {
            Ok(service) => service,
            Err(e) => {
                self.monitor.set_status(Status::Failed, Some(&e.to_string()));
                return Err(e);
            }
        };

        let token = CancellationToken::new();
        let service_ctx = ServiceContext::new(
            self.service_id.clone(),
            state.resolved.clone(),
            self.monitor.monitor().clone(),
            token.clone(),
        );

        if let Err(e) = service.on_start(&service_ctx).await {
            self.monitor.set_status(Status::Failed, Some(&e.to_string()));
            return Err(ControllerError::StartFailed(e));
        }

        *self.result.lock() = None;
        let monitor = Arc::clone(&self.monitor);
        let result_slot = Arc::clone(&self.result);
        let completed = Arc::clone(&self.completed);
        let run_ctx = service_ctx.clone();
        let handle = tokio::spawn(async move {
            let outcome = service.run(&run_ctx).await;
            match &outcome {
                Ok(ServiceOutcome::Completed) => {
                    monitor.set_status(Status::Shutdown, Some("Completed"));
                }
                Ok(ServiceOutcome::Stopped) => {}
                Err(e) => {
                    monitor.set_status(Status::Failed, Some(&e.to_string()));
                    tracing::error!(error = %e, "service run failed");
                }
            }
            if outcome.is_ok() {
                if let Err(e) = service.on_stop(&run_ctx).await {
                    tracing::warn!(error = %e, "service stop hook failed");
                }
            }
            *result_slot.lock() = Some(outcome);
            completed.notify_waiters();
        });

        state.token = Some(token);
        state.run_task = Some(handle);
        state.running = true;
        self.monitor.set_status(Status::Ok, Some("Service running"));
        tracing::info!(service_id = %self.service_id, "service started");
        Ok(())
    }

    /// Wait for the service task to finish and return its outcome.
    ///
    /// Used by hosting binaries: a `Completed` outcome means a clean
    /// single-shot exit, an error carries the process exit code.
    pub async fn wait_outcome(&self) -> Result<ServiceOutcome, ServiceError> {
        loop {
            let notified = self.completed.notified();
            if let Some(result) = self.result.lock().clone() {
                return result;
            }
            notified.await;
        }
    }

    /// Stop the service. Idempotent; callable whether or not it is running.
    pub async fn stop_service(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Ok(());
        }

        // The service may have already ended on its own (completion or
        // crash). Its terminal status stands; only the bookkeeping remains.
        if self.result.lock().is_some() {
            state.token = None;
            state.run_task = None;
            state.running = false;
            return Ok(());
        }

        self.monitor.set_status(Status::Shutdown, Some("Stopping service"));
        if let Some(token) = state.token.take() {
            token.cancel();
        }
        if let Some(task) = state.run_task.take() {
            let abort = task.abort_handle();
            match tokio::time::timeout(STOP_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(service_id = %self.service_id, error = %e, "service task join failed");
                }
                Err(_) => {
                    tracing::warn!(
                        service_id = %self.service_id,
                        "service did not stop within {:?}, aborting",
                        STOP_TIMEOUT
                    );
                    abort.abort();
                }
            }
        }
        state.running = false;
        self.monitor.set_status(Status::Ok, Some("Service stopped"));
        tracing::info!(service_id = %self.service_id, "service stopped");
        Ok(())
    }

    /// Full teardown: stop the service, publish shutdown, stop monitoring,
    /// unregister from the process context. Idempotent.
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        {
            let mut state = self.state.lock().await;
            if state.shut_down {
                return Ok(());
            }
            state.shut_down = true;
        }

        tracing::info!(service_id = %self.service_id, "shutting down controller");
        self.stop_service().await?;
        // A failed service keeps its terminal status on the stream.
        if self.monitor.status() != Status::Failed {
            self.monitor.set_status(Status::Shutdown, Some("Controller shutdown"));
        }
        self.monitor.send_shutdown().await;
        self.monitor.stop_monitoring().await;

        if let Some(context) = self.context.upgrade() {
            context.unregister_controller(&self.registry_key());
        }
        tracing::info!(service_id = %self.service_id, "controller shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
