// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Same-process runner: hosts a [`ServiceController`] directly and feeds the
//! service outcome through the same restart decision as the subprocess
//! runner (a run error counts as exit code 1, a clean return as 0).

use super::{EventPublisher, Runner, RunnerConfig, RunnerError, RunnerStatus};
use crate::policy::{evaluate_crash, RestartTracker};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tcs_bus::MessageSink;
use tcs_runtime::{ProcessContext, ServiceCatalog, ServiceController, ServiceRegistry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct InProcState {
    running: bool,
    stopping: bool,
    controller: Option<Arc<ServiceController>>,
    watcher: Option<JoinHandle<()>>,
    start_time: Option<DateTime<Utc>>,
    tracker: RestartTracker,
    run_token: Option<CancellationToken>,
}

struct InProcInner {
    config: RunnerConfig,
    events: EventPublisher,
    context: Arc<ProcessContext>,
    registry: ServiceRegistry,
    catalog: ServiceCatalog,
    state: Mutex<InProcState>,
}

/// Runner that manages a service within the launcher's own process.
pub struct InProcessRunner {
    inner: Arc<InProcInner>,
}

impl InProcessRunner {
    pub fn new(
        config: RunnerConfig,
        context: Arc<ProcessContext>,
        registry: ServiceRegistry,
        catalog: ServiceCatalog,
        sink: Option<Arc<dyn MessageSink>>,
        subject_prefix: &str,
    ) -> Self {
        let events = EventPublisher::new(sink, subject_prefix, &config);
        Self {
            inner: Arc::new(InProcInner {
                config,
                events,
                context,
                registry,
                catalog,
                state: Mutex::new(InProcState {
                    running: false,
                    stopping: false,
                    controller: None,
                    watcher: None,
                    start_time: None,
                    tracker: RestartTracker::new(),
                    run_token: None,
                }),
            }),
        }
    }
}

impl InProcInner {
    fn service_id(&self) -> String {
        self.config.service_id.to_string()
    }

    async fn start_impl(self: &Arc<Self>) -> Result<(), RunnerError> {
        if self.state.lock().running {
            tracing::warn!(service_id = %self.service_id(), "service already running");
            return Err(RunnerError::AlreadyRunning(self.service_id()));
        }

        let controller = ServiceController::create(
            &self.context,
            &self.registry,
            self.catalog.clone(),
            self.config.service_id.clone(),
            self.config.runner_id.clone(),
            self.config.parent_name.clone(),
        );

        if let Err(e) = controller.initialize().await {
            let _ = controller.shutdown().await;
            return Err(RunnerError::Controller {
                service_id: self.service_id(),
                message: e.to_string(),
            });
        }
        if let Err(e) = controller.start_service().await {
            let _ = controller.shutdown().await;
            return Err(RunnerError::Controller {
                service_id: self.service_id(),
                message: e.to_string(),
            });
        }

        {
            let mut state = self.state.lock();
            state.running = true;
            state.stopping = false;
            state.controller = Some(Arc::clone(&controller));
            state.start_time = Some(Utc::now());
            state.run_token = Some(CancellationToken::new());
        }
        let watcher = tokio::spawn(Self::watch_completion(Arc::clone(self), controller));
        self.state.lock().watcher = Some(watcher);

        tracing::info!(service_id = %self.service_id(), "service started in-process");
        self.events.start(std::process::id()).await;
        Ok(())
    }

    async fn watch_completion(inner: Arc<Self>, controller: Arc<ServiceController>) {
        let outcome = controller.wait_outcome().await;
        let exit_code = match &outcome {
            Ok(_) => 0,
            Err(e) => e.exit_code(),
        };
        inner.handle_exit(exit_code, controller).await;
    }

    async fn handle_exit(self: &Arc<Self>, exit_code: i32, controller: Arc<ServiceController>) {
        let stopping = {
            let mut state = self.state.lock();
            state.controller = None;
            state.stopping
        };
        if stopping {
            // The stop path drives controller teardown and event emission.
            self.state.lock().running = false;
            return;
        }

        if exit_code == 0 {
            tracing::info!(service_id = %self.service_id(), "service completed cleanly");
            self.events.stop("completed", 0).await;
            let _ = controller.shutdown().await;
            self.state.lock().running = false;
            return;
        }

        tracing::warn!(service_id = %self.service_id(), exit_code, "service failed");
        let verdict = {
            let mut state = self.state.lock();
            evaluate_crash(&self.config.restart, &mut state.tracker, exit_code, Instant::now())
        };
        self.events.crashed(exit_code, verdict.will_restart()).await;
        let _ = controller.shutdown().await;

        if !verdict.policy_wants {
            self.state.lock().running = false;
            return;
        }
        if verdict.limit_reached {
            tracing::error!(
                service_id = %self.service_id(),
                max = self.config.restart.max,
                "restart limit reached, giving up"
            );
            self.events.failed("restart_limit_reached", verdict.restart_count).await;
            self.state.lock().running = false;
            return;
        }

        let run_token = self.state.lock().run_token.clone();
        if let Some(token) = run_token {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!(service_id = %self.service_id(), "pending restart abandoned");
                    self.state.lock().running = false;
                    return;
                }
                _ = tokio::time::sleep(self.config.restart.delay) => {}
            }
        } else {
            tokio::time::sleep(self.config.restart.delay).await;
        }

        let attempt = verdict.restart_count + 1;
        let max_restarts = (self.config.restart.max > 0).then_some(self.config.restart.max);
        self.events.restarting(attempt, max_restarts).await;
        tracing::info!(service_id = %self.service_id(), attempt, "restarting service");

        self.state.lock().running = false;
        match self.start_impl().await {
            Ok(()) => {
                self.state.lock().tracker.record(Instant::now());
            }
            Err(e) => {
                tracing::error!(service_id = %self.service_id(), error = %e, "restart failed, giving up");
                self.events.failed("restart_failed", verdict.restart_count).await;
            }
        }
    }

    async fn stop_impl(&self) -> Result<(), RunnerError> {
        let (controller, run_token) = {
            let mut state = self.state.lock();
            if !state.running {
                tracing::warn!(service_id = %self.service_id(), "service not running");
                return Err(RunnerError::NotRunning(self.service_id()));
            }
            state.stopping = true;
            (state.controller.clone(), state.run_token.clone())
        };

        if let Some(token) = run_token {
            token.cancel();
        }
        if let Some(controller) = controller {
            if let Err(e) = controller.stop_service().await {
                tracing::error!(service_id = %self.service_id(), error = %e, "stop failed");
            }
            if let Err(e) = controller.shutdown().await {
                tracing::error!(service_id = %self.service_id(), error = %e, "controller shutdown failed");
            }
        }

        let watcher = self.state.lock().watcher.take();
        if let Some(watcher) = watcher {
            if tokio::time::timeout(std::time::Duration::from_secs(2), watcher).await.is_err() {
                tracing::warn!(service_id = %self.service_id(), "completion watcher did not settle");
            }
        }

        {
            let mut state = self.state.lock();
            state.running = false;
            state.stopping = false;
            state.controller = None;
            state.start_time = None;
            state.run_token = None;
        }
        tracing::info!(service_id = %self.service_id(), "service stopped");
        Ok(())
    }
}

#[async_trait]
impl Runner for InProcessRunner {
    fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }

    fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    async fn start(&self) -> Result<(), RunnerError> {
        self.inner.start_impl().await
    }

    async fn stop(&self) -> Result<(), RunnerError> {
        self.inner.stop_impl().await
    }

    async fn restart(&self) -> Result<(), RunnerError> {
        self.inner.stop_impl().await?;
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        self.inner.start_impl().await
    }

    fn status(&self) -> RunnerStatus {
        let state = self.inner.state.lock();
        let uptime = state
            .start_time
            .map(|start| (Utc::now() - start).num_milliseconds() as f64 / 1000.0);
        RunnerStatus {
            service_id: self.inner.service_id(),
            running: state.running,
            pid: state.running.then(std::process::id),
            start_time: state.start_time,
            uptime_seconds: uptime,
        }
    }

    async fn publish_declared(&self) {
        self.inner.events.declared().await;
    }
}

#[cfg(test)]
#[path = "in_process_tests.rs"]
mod tests;
