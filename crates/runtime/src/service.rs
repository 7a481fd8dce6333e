// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The service contract.
//!
//! Three lifecycle shapes share one trait:
//! - blocking permanent: override `run` with a loop that watches
//!   [`ServiceContext::is_running`] or uses the exit-aware
//!   [`ServiceContext::sleep`];
//! - non-blocking permanent: spawn background tasks in `on_start`, reap them
//!   in `on_stop`, keep the default `run` (which just waits for stop);
//! - single-shot: do the work in `run` and return
//!   [`ServiceOutcome::Completed`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tcs_core::ServiceId;
use tcs_monitor::{Monitor, TaskGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service start failed: {0}")]
    Start(String),
    #[error("service failed: {0}")]
    Runtime(String),
    /// Failure with a specific process exit code, for services whose exit
    /// status feeds restart-policy decisions.
    #[error("service exited with code {code}: {message}")]
    Crash { code: i32, message: String },
    #[error("service stop failed: {0}")]
    Stop(String),
}

impl ServiceError {
    /// Exit code a hosting process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::Crash { code, .. } => *code,
            _ => 1,
        }
    }
}

/// How a service's `run` concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Permanent service observed the stop signal and wound down.
    Stopped,
    /// Single-shot service finished its work; the exit is clean.
    Completed,
}

/// Everything a running service sees from its host.
#[derive(Clone)]
pub struct ServiceContext {
    service_id: ServiceId,
    config: Map<String, Value>,
    monitor: Monitor,
    token: CancellationToken,
}

impl ServiceContext {
    pub fn new(
        service_id: ServiceId,
        config: Map<String, Value>,
        monitor: Monitor,
        token: CancellationToken,
    ) -> Self {
        Self { service_id, config, monitor, token }
    }

    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// Resolved, service-scoped configuration.
    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Mark the entity busy for the lifetime of the returned guard.
    pub fn track_task(&self, label: Option<&str>) -> TaskGuard {
        self.monitor.track_task(label)
    }

    /// False once stop has been signalled.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Exit-aware sleep: returns `true` when the full duration elapsed,
    /// `false` when stop was signalled first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    pub async fn wait_for_stop(&self) {
        self.token.cancelled().await;
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.token
    }
}

/// One service implementation.
#[async_trait]
pub trait Service: Send + 'static {
    /// Startup hook; runs before the service task is spawned.
    async fn on_start(&mut self, ctx: &ServiceContext) -> Result<(), ServiceError> {
        let _ = ctx;
        Ok(())
    }

    /// Main body. The default waits for stop, which suits non-blocking
    /// permanent services whose work lives in tasks spawned by `on_start`.
    async fn run(&mut self, ctx: &ServiceContext) -> Result<ServiceOutcome, ServiceError> {
        ctx.wait_for_stop().await;
        Ok(ServiceOutcome::Stopped)
    }

    /// Teardown hook; runs after `run` returns.
    async fn on_stop(&mut self, ctx: &ServiceContext) -> Result<(), ServiceError> {
        let _ = ctx;
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
