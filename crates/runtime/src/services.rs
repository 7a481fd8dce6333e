// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in services used by deployments for smoke testing and by the
//! supervisor's own test suite.

use crate::catalog::{bind_config, BaseServiceConfig, ServiceCatalog, ServiceConfig};
use crate::service::{Service, ServiceContext, ServiceError, ServiceOutcome};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Register every built-in service type.
pub fn register_builtin(catalog: &mut ServiceCatalog) {
    catalog.register("mock_permanent", |resolved| {
        let config: MockPermanentConfig = bind_config(resolved)?;
        Ok(Box::new(MockPermanentService { config }))
    });
    catalog.register("mock_crashing", |resolved| {
        let config: MockCrashingConfig = bind_config(resolved)?;
        Ok(Box::new(MockCrashingService { config }))
    });
    catalog.register("mock_hanging", |resolved| {
        // No config class of its own; the minimal base applies.
        let _: BaseServiceConfig = bind_config(resolved)?;
        Ok(Box::new(MockHangingService))
    });
    catalog.register("mock_oneshot", |resolved| {
        let config: MockOneshotConfig = bind_config(resolved)?;
        Ok(Box::new(MockOneshotService { config }))
    });
}

fn duration(secs: f64) -> Duration {
    Duration::from_secs_f64(secs.max(0.0))
}

// ---------------------------------------------------------------------------
// mock_permanent: blocking permanent loop that ticks until stopped.

#[derive(Debug, Deserialize)]
pub struct MockPermanentConfig {
    #[serde(default = "MockPermanentConfig::default_work_interval")]
    pub work_interval: f64,
}

impl MockPermanentConfig {
    fn default_work_interval() -> f64 {
        0.5
    }
}

impl Default for MockPermanentConfig {
    fn default() -> Self {
        Self { work_interval: Self::default_work_interval() }
    }
}

impl ServiceConfig for MockPermanentConfig {
    const FIELDS: &'static [&'static str] = &["work_interval"];
}

pub struct MockPermanentService {
    config: MockPermanentConfig,
}

#[async_trait]
impl Service for MockPermanentService {
    async fn run(&mut self, ctx: &ServiceContext) -> Result<ServiceOutcome, ServiceError> {
        let mut cycle = 0u64;
        while ctx.sleep(duration(self.config.work_interval)).await {
            cycle += 1;
            tracing::debug!(service = %ctx.service_id(), cycle, "work cycle");
        }
        Ok(ServiceOutcome::Stopped)
    }
}

// ---------------------------------------------------------------------------
// mock_crashing: exits with a configurable code after a delay.

#[derive(Debug, Deserialize)]
pub struct MockCrashingConfig {
    #[serde(default = "MockCrashingConfig::default_crash_delay")]
    pub crash_delay: f64,
    #[serde(default = "MockCrashingConfig::default_exit_code")]
    pub exit_code: i32,
}

impl MockCrashingConfig {
    fn default_crash_delay() -> f64 {
        0.5
    }

    fn default_exit_code() -> i32 {
        1
    }
}

impl Default for MockCrashingConfig {
    fn default() -> Self {
        Self {
            crash_delay: Self::default_crash_delay(),
            exit_code: Self::default_exit_code(),
        }
    }
}

impl ServiceConfig for MockCrashingConfig {
    const FIELDS: &'static [&'static str] = &["crash_delay", "exit_code"];
}

pub struct MockCrashingService {
    config: MockCrashingConfig,
}

#[async_trait]
impl Service for MockCrashingService {
    async fn run(&mut self, ctx: &ServiceContext) -> Result<ServiceOutcome, ServiceError> {
        if !ctx.sleep(duration(self.config.crash_delay)).await {
            return Ok(ServiceOutcome::Stopped);
        }
        Err(ServiceError::Crash {
            code: self.config.exit_code,
            message: "simulated crash".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// mock_hanging: ignores the stop signal entirely, for forced-kill paths.

pub struct MockHangingService;

#[async_trait]
impl Service for MockHangingService {
    async fn run(&mut self, _ctx: &ServiceContext) -> Result<ServiceOutcome, ServiceError> {
        std::future::pending::<()>().await;
        Ok(ServiceOutcome::Stopped)
    }
}

// ---------------------------------------------------------------------------
// mock_oneshot: single-shot service, clean completion.

#[derive(Debug, Deserialize)]
pub struct MockOneshotConfig {
    #[serde(default = "MockOneshotConfig::default_work_delay")]
    pub work_delay: f64,
}

impl MockOneshotConfig {
    fn default_work_delay() -> f64 {
        0.1
    }
}

impl Default for MockOneshotConfig {
    fn default() -> Self {
        Self { work_delay: Self::default_work_delay() }
    }
}

impl ServiceConfig for MockOneshotConfig {
    const FIELDS: &'static [&'static str] = &["work_delay"];
}

pub struct MockOneshotService {
    config: MockOneshotConfig,
}

#[async_trait]
impl Service for MockOneshotService {
    async fn run(&mut self, ctx: &ServiceContext) -> Result<ServiceOutcome, ServiceError> {
        let _task = ctx.track_task(Some("oneshot work"));
        tokio::time::sleep(duration(self.config.work_delay)).await;
        tracing::info!(service = %ctx.service_id(), "one-shot work finished");
        Ok(ServiceOutcome::Completed)
    }
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
