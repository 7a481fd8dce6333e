// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus-backed reporter: heartbeats, change-driven status, registry events.

use crate::monitored::Monitor;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tcs_bus::subjects::{heartbeat_subject, registry_subject, status_subject, DEFAULT_PREFIX};
use tcs_bus::MessageSink;
use tcs_core::{Heartbeat, RegistryEvent, Status, UtcTimestamp};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tuning knobs for a bus monitor.
#[derive(Debug, Clone)]
pub struct BusMonitorOptions {
    pub subject_prefix: String,
    pub heartbeat_interval: Duration,
    pub healthcheck_interval: Duration,
    /// Display-grouping hint added to published reports and start events.
    pub parent_name: Option<String>,
    /// Runner identity included in registry events, when supervised.
    pub runner_id: Option<String>,
}

impl Default for BusMonitorOptions {
    fn default() -> Self {
        Self {
            subject_prefix: DEFAULT_PREFIX.to_string(),
            heartbeat_interval: Duration::from_secs(10),
            healthcheck_interval: Duration::from_secs(30),
            parent_name: None,
            runner_id: None,
        }
    }
}

/// Monitor that publishes its state over the bus.
///
/// Constructed without a sink it degrades to a no-op reporter: all local
/// status behavior is kept, nothing leaves the process. Publication is
/// best-effort throughout; a failed publish never disturbs the host.
pub struct BusMonitor {
    monitor: Monitor,
    sink: Option<Arc<dyn MessageSink>>,
    options: BusMonitorOptions,
    token: Mutex<Option<CancellationToken>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl BusMonitor {
    pub fn new(
        name: impl Into<String>,
        sink: Option<Arc<dyn MessageSink>>,
        options: BusMonitorOptions,
    ) -> Self {
        Self {
            monitor: Monitor::new(name),
            sink,
            options,
            token: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    pub fn status(&self) -> Status {
        self.monitor.status()
    }

    pub fn set_status(&self, status: Status, message: Option<&str>) {
        self.monitor.set_status(status, message);
    }

    pub fn is_publishing(&self) -> bool {
        self.sink.is_some()
    }

    async fn publish(sink: &Arc<dyn MessageSink>, subject: String, payload: Value) {
        if let Err(e) = sink.publish(subject.clone(), payload).await {
            tracing::warn!(subject = %subject, error = %e, "publish failed");
        }
    }

    async fn publish_status_report(&self) {
        let Some(sink) = &self.sink else { return };
        let mut report = self.monitor.full_report().await;
        report.parent = self.options.parent_name.clone();
        let subject = status_subject(&self.options.subject_prefix, self.monitor.name());
        match serde_json::to_value(&report) {
            Ok(payload) => Self::publish(sink, subject, payload).await,
            Err(e) => tracing::warn!(error = %e, "status report serialization failed"),
        }
    }

    /// Start the heartbeat and healthcheck tasks and wire status-change
    /// publication. Idempotent while running.
    pub async fn start_monitoring(&self) {
        if self.token.lock().is_some() {
            tracing::warn!(monitor = %self.name(), "monitoring already started");
            return;
        }
        let token = CancellationToken::new();
        *self.token.lock() = Some(token.clone());

        let mut tasks = Vec::new();

        if let Some(sink) = self.sink.clone() {
            // Change-driven status publication: the sync hook enqueues, the
            // publisher task drains and publishes outside any lock.
            let (tx, mut rx) = mpsc::unbounded_channel::<()>();
            self.monitor.set_on_change(Arc::new(move || {
                let _ = tx.send(());
            }));

            let status_sink = sink.clone();
            let status_monitor = self.monitor.clone();
            let parent_name = self.options.parent_name.clone();
            let prefix = self.options.subject_prefix.clone();
            let status_token = token.clone();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = status_token.cancelled() => break,
                        next = rx.recv() => {
                            if next.is_none() {
                                break;
                            }
                            // Collapse bursts of changes into one report.
                            while rx.try_recv().is_ok() {}
                            let mut report = status_monitor.full_report().await;
                            report.parent = parent_name.clone();
                            let subject = status_subject(&prefix, status_monitor.name());
                            match serde_json::to_value(&report) {
                                Ok(payload) => Self::publish(&status_sink, subject, payload).await,
                                Err(e) => {
                                    tracing::warn!(error = %e, "status report serialization failed");
                                }
                            }
                        }
                    }
                }
            }));

            // Heartbeat task: fixed interval, survives publish failures.
            let hb_monitor = self.monitor.clone();
            let hb_prefix = self.options.subject_prefix.clone();
            let hb_interval = self.options.heartbeat_interval;
            let hb_token = token.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(hb_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = hb_token.cancelled() => break,
                        _ = ticker.tick() => {
                            let heartbeat = Heartbeat {
                                service_id: hb_monitor.name().to_string(),
                                timestamp: UtcTimestamp::now(),
                                status: hb_monitor.status(),
                            };
                            let subject = heartbeat_subject(&hb_prefix, hb_monitor.name());
                            match serde_json::to_value(&heartbeat) {
                                Ok(payload) => Self::publish(&sink, subject, payload).await,
                                Err(e) => tracing::warn!(error = %e, "heartbeat serialization failed"),
                            }
                        }
                    }
                }
            }));
        }

        // Healthcheck task: longer interval, updates status when unhealthy
        // and publishes the periodic full report. Runs with or without a
        // sink; the status change itself also triggers publication when one
        // is attached.
        let hc_monitor = self.monitor.clone();
        let hc_sink = self.sink.clone();
        let hc_parent = self.options.parent_name.clone();
        let hc_prefix = self.options.subject_prefix.clone();
        let hc_interval = self.options.healthcheck_interval;
        let hc_token = token.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(hc_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a fresh monitor
            // is not marked unhealthy before its service finished starting.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = hc_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let verdict = hc_monitor.healthcheck().await;
                        if verdict != hc_monitor.status() && !verdict.is_healthy() {
                            hc_monitor.set_status(verdict, Some("healthcheck"));
                        }
                        if let Some(sink) = &hc_sink {
                            let mut report = hc_monitor.full_report().await;
                            report.parent = hc_parent.clone();
                            let subject = status_subject(&hc_prefix, hc_monitor.name());
                            match serde_json::to_value(&report) {
                                Ok(payload) => Self::publish(sink, subject, payload).await,
                                Err(e) => {
                                    tracing::warn!(error = %e, "status report serialization failed");
                                }
                            }
                        }
                    }
                }
            }
        }));

        *self.tasks.lock() = tasks;
        tracing::info!(
            monitor = %self.name(),
            heartbeat_secs = self.options.heartbeat_interval.as_secs_f64(),
            publishing = self.is_publishing(),
            "monitoring started"
        );
    }

    /// Stop the periodic tasks. Idempotent.
    pub async fn stop_monitoring(&self) {
        let Some(token) = self.token.lock().take() else { return };
        token.cancel();
        self.monitor.clear_on_change();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(monitor = %self.name(), error = %e, "monitoring task join failed");
                }
            }
        }
        tracing::info!(monitor = %self.name(), "monitoring stopped");
    }

    /// Publish the registry start event announcing this entity.
    pub async fn send_registration(&self) {
        let Some(sink) = &self.sink else {
            tracing::debug!(monitor = %self.name(), "no sink, registration skipped");
            return;
        };
        let event = RegistryEvent::Start {
            service_id: self.name().to_string(),
            timestamp: UtcTimestamp::now(),
            parent: self.options.parent_name.clone(),
            runner_id: self.options.runner_id.clone(),
            status: self.status(),
            hostname: hostname(),
            pid: std::process::id(),
        };
        let subject = registry_subject(&self.options.subject_prefix, "start", self.name());
        match serde_json::to_value(&event) {
            Ok(payload) => Self::publish(sink, subject, payload).await,
            Err(e) => tracing::warn!(error = %e, "start event serialization failed"),
        }
        // Follow with an initial status report so observers see state
        // without waiting for the first change.
        self.publish_status_report().await;
    }

    /// Publish the registry stop event for this entity.
    pub async fn send_shutdown(&self) {
        let Some(sink) = &self.sink else { return };
        let event = RegistryEvent::Stop {
            service_id: self.name().to_string(),
            timestamp: UtcTimestamp::now(),
            parent: self.options.parent_name.clone(),
            runner_id: self.options.runner_id.clone(),
            status: Status::Shutdown,
            reason: "shutdown".to_string(),
            exit_code: 0,
        };
        let subject = registry_subject(&self.options.subject_prefix, "stop", self.name());
        match serde_json::to_value(&event) {
            Ok(payload) => Self::publish(sink, subject, payload).await,
            Err(e) => tracing::warn!(error = %e, "stop event serialization failed"),
        }
    }
}

fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
#[path = "bus_monitor_tests.rs"]
mod tests;
