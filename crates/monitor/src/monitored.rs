// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitored objects: status, callbacks, child aggregation, task tracking.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tcs_core::{aggregate_status, Status, StatusReport};

/// Debounce before an entity whose last task finished goes idle.
const IDLE_DEBOUNCE: Duration = Duration::from_secs(1);

type BoxError = Box<dyn std::error::Error + Send + Sync>;
/// A healthcheck returns a non-healthy status to signal a problem, or
/// `None` when it has nothing to report.
pub type HealthcheckResult = Result<Option<Status>, BoxError>;
type HealthcheckFn = Arc<dyn Fn() -> BoxFuture<'static, HealthcheckResult> + Send + Sync>;
type MetricFn = Arc<dyn Fn() -> BoxFuture<'static, Map<String, Value>> + Send + Sync>;
type ChangeHook = Arc<dyn Fn() + Send + Sync>;

struct State {
    status: Status,
    message: Option<String>,
    children: BTreeMap<String, Monitor>,
    healthchecks: Vec<HealthcheckFn>,
    metrics: Vec<MetricFn>,
    active_tasks: u32,
    idle_timer: Option<tokio::task::JoinHandle<()>>,
    idle_epoch: u64,
}

struct Inner {
    name: String,
    state: Mutex<State>,
    parent: Mutex<Weak<Inner>>,
    on_change: Mutex<Option<ChangeHook>>,
}

/// Health state of one entity, with child monitors for rollup.
///
/// Cheap to clone; clones share state. The child relation is a strict tree:
/// the parent owns its children, each child keeps only a weak back-pointer
/// for upward change notification.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State {
                    status: Status::Unknown,
                    message: None,
                    children: BTreeMap::new(),
                    healthchecks: Vec::new(),
                    metrics: Vec::new(),
                    active_tasks: 0,
                    idle_timer: None,
                    idle_epoch: 0,
                }),
                parent: Mutex::new(Weak::new()),
                on_change: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn status(&self) -> Status {
        self.inner.state.lock().status
    }

    pub fn message(&self) -> Option<String> {
        self.inner.state.lock().message.clone()
    }

    /// Set status directly and notify the change hooks up the tree.
    pub fn set_status(&self, status: Status, message: Option<&str>) {
        {
            let mut state = self.inner.state.lock();
            state.status = status;
            state.message = message.map(str::to_string);
        }
        tracing::debug!(monitor = %self.inner.name, status = %status, message, "status set");
        self.notify_change();
    }

    /// Register the hook fired on any status change in this monitor or a
    /// descendant. Used by bus-backed monitors to push updates out-of-band.
    pub fn set_on_change(&self, hook: Arc<dyn Fn() + Send + Sync>) {
        *self.inner.on_change.lock() = Some(hook);
    }

    pub fn clear_on_change(&self) {
        *self.inner.on_change.lock() = None;
    }

    fn notify_change(&self) {
        let mut node = Some(self.inner.clone());
        while let Some(inner) = node {
            let hook = inner.on_change.lock().clone();
            if let Some(hook) = hook {
                hook();
            }
            node = inner.parent.lock().upgrade();
        }
    }

    /// Register an async healthcheck callback.
    pub fn add_healthcheck<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HealthcheckResult> + Send + 'static,
    {
        let wrapped: HealthcheckFn = Arc::new(move || callback().boxed());
        self.inner.state.lock().healthchecks.push(wrapped);
    }

    /// Register a synchronous healthcheck callback.
    pub fn add_healthcheck_fn<F>(&self, callback: F)
    where
        F: Fn() -> Option<Status> + Send + Sync + 'static,
    {
        self.add_healthcheck(move || {
            let result = callback();
            async move { Ok(result) }
        });
    }

    /// Register an async metric callback; its payload is embedded in reports.
    pub fn add_metric<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Map<String, Value>> + Send + 'static,
    {
        let wrapped: MetricFn = Arc::new(move || callback().boxed());
        self.inner.state.lock().metrics.push(wrapped);
    }

    /// Register a synchronous metric callback.
    pub fn add_metric_fn<F>(&self, callback: F)
    where
        F: Fn() -> Map<String, Value> + Send + Sync + 'static,
    {
        self.add_metric(move || {
            let result = callback();
            async move { result }
        });
    }

    /// Attach a child monitor. A child has at most one parent; attaching an
    /// already-parented child reparents it here.
    pub fn add_submonitor(&self, child: &Monitor) {
        *child.inner.parent.lock() = Arc::downgrade(&self.inner);
        self.inner
            .state
            .lock()
            .children
            .insert(child.name().to_string(), child.clone());
        tracing::debug!(monitor = %self.inner.name, child = %child.name(), "submonitor added");
    }

    pub fn remove_submonitor(&self, name: &str) {
        if let Some(child) = self.inner.state.lock().children.remove(name) {
            *child.inner.parent.lock() = Weak::new();
            tracing::debug!(monitor = %self.inner.name, child = name, "submonitor removed");
        }
    }

    /// Run healthcheck callbacks in registration order; the first non-healthy
    /// result wins. A callback error counts as `Error` for that callback.
    /// With no findings, the current status is returned.
    pub async fn healthcheck(&self) -> Status {
        let callbacks: Vec<HealthcheckFn> = self.inner.state.lock().healthchecks.clone();
        for callback in callbacks {
            match callback().await {
                Ok(Some(status)) if !status.is_healthy() => return status,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(monitor = %self.inner.name, error = %e, "healthcheck callback failed");
                    return Status::Error;
                }
            }
        }
        self.status()
    }

    /// Build a recursive report. The report status is the aggregate of this
    /// monitor's own status and every descendant's.
    pub fn full_report(&self) -> BoxFuture<'static, StatusReport> {
        let this = self.clone();
        async move {
            let (own_status, message, children, metrics) = {
                let state = this.inner.state.lock();
                (
                    state.status,
                    state.message.clone(),
                    state.children.values().cloned().collect::<Vec<_>>(),
                    state.metrics.clone(),
                )
            };

            let mut metric_payload = Map::new();
            for metric in metrics {
                let payload = metric().await;
                metric_payload.extend(payload);
            }

            let mut child_reports = Vec::with_capacity(children.len());
            for child in children {
                child_reports.push(child.full_report().await);
            }

            let mut statuses = vec![own_status];
            statuses.extend(child_reports.iter().map(|r| r.status));
            let aggregated = aggregate_status(&statuses);

            let mut details = Map::new();
            if !metric_payload.is_empty() {
                details.insert("metrics".to_string(), Value::Object(metric_payload));
            }
            if !child_reports.is_empty() {
                details.insert("own_status".to_string(), Value::from(own_status.as_str()));
                let children_json: Vec<Value> = child_reports
                    .iter()
                    .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
                    .collect();
                details.insert("children".to_string(), Value::Array(children_json));
            }

            StatusReport {
                name: this.inner.name.clone(),
                status: aggregated,
                timestamp: tcs_core::UtcTimestamp::now(),
                message,
                details: (!details.is_empty()).then_some(details),
                parent: None,
            }
        }
        .boxed()
    }

    /// Scoped task tracking: the entity is `Busy` while any guard is alive,
    /// and goes `Idle` a debounce after the last one is dropped, unless a
    /// non-healthy status was set while the task ran.
    pub fn track_task(&self, label: Option<&str>) -> TaskGuard {
        {
            let mut state = self.inner.state.lock();
            if let Some(timer) = state.idle_timer.take() {
                timer.abort();
            }
            state.idle_epoch += 1;
            state.active_tasks += 1;
        }
        self.set_status(Status::Busy, label);
        TaskGuard { monitor: self.clone() }
    }

    pub fn active_tasks(&self) -> u32 {
        self.inner.state.lock().active_tasks
    }

    fn task_finished(&self) {
        let arm = {
            let mut state = self.inner.state.lock();
            state.active_tasks = state.active_tasks.saturating_sub(1);
            if state.active_tasks == 0 {
                state.idle_epoch += 1;
                Some(state.idle_epoch)
            } else {
                None
            }
        };
        let Some(epoch) = arm else { return };
        // Without a runtime (plain sync drop in tests) the idle transition
        // is skipped; callers in that position assert on the counter.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let monitor = self.clone();
        let timer = handle.spawn(async move {
            tokio::time::sleep(IDLE_DEBOUNCE).await;
            let fire = {
                let state = monitor.inner.state.lock();
                state.active_tasks == 0 && state.idle_epoch == epoch
            };
            if fire && monitor.status().is_healthy() {
                monitor.set_status(Status::Idle, None);
            }
        });
        self.inner.state.lock().idle_timer = Some(timer);
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Guard returned by [`Monitor::track_task`]; dropping it ends the task.
pub struct TaskGuard {
    monitor: Monitor,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.monitor.task_finished();
    }
}

#[cfg(test)]
#[path = "monitored_tests.rs"]
mod tests;
