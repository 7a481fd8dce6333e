// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot and follow-mode reconstruction of fleet state.
//!
//! Three streams feed the per-service records, each owning its fields:
//! registry events own lifecycle (start/stop times, runner identity),
//! status reports own current state, heartbeats own liveness.

use crate::info::ServiceInfo;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tcs_bus::{Bus, BusError, ReadFrom, StreamKind};
use tcs_core::{Status, UtcTimestamp};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Status backlog window for snapshots.
const STATUS_LOOKBACK_HOURS: i64 = 24;
/// Heartbeat backlog window for snapshots.
const HEARTBEAT_LOOKBACK_MINUTES: i64 = 10;

type Callback = Arc<dyn Fn(&ServiceInfo) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_update: Option<Callback>,
    on_start: Option<Callback>,
    on_stop: Option<Callback>,
}

struct FollowState {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Client reconstructing fleet state from the three retained streams.
pub struct FleetObserver {
    bus: Arc<Bus>,
    prefix: String,
    services: Arc<Mutex<HashMap<String, ServiceInfo>>>,
    callbacks: Arc<Mutex<Callbacks>>,
    follow: Mutex<Option<FollowState>>,
}

impl FleetObserver {
    pub fn new(bus: Arc<Bus>, subject_prefix: impl Into<String>) -> Self {
        Self {
            bus,
            prefix: subject_prefix.into(),
            services: Arc::new(Mutex::new(HashMap::new())),
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
            follow: Mutex::new(None),
        }
    }

    pub fn on_service_update(&self, callback: impl Fn(&ServiceInfo) + Send + Sync + 'static) {
        self.callbacks.lock().on_update = Some(Arc::new(callback));
    }

    pub fn on_service_start(&self, callback: impl Fn(&ServiceInfo) + Send + Sync + 'static) {
        self.callbacks.lock().on_start = Some(Arc::new(callback));
    }

    pub fn on_service_stop(&self, callback: impl Fn(&ServiceInfo) + Send + Sync + 'static) {
        self.callbacks.lock().on_stop = Some(Arc::new(callback));
    }

    // ----- snapshot mode -----

    /// Collect a one-shot snapshot of all services.
    pub async fn list_services(&self, include_stopped: bool) -> Result<Vec<ServiceInfo>, BusError> {
        let map = self.collect_snapshot().await?;
        let mut services: Vec<ServiceInfo> = map.into_values().collect();
        if !include_stopped {
            services.retain(ServiceInfo::is_running);
        }
        services.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(services)
    }

    /// Snapshot lookup of one service.
    pub async fn get_service(&self, service_id: &str) -> Result<Option<ServiceInfo>, BusError> {
        let mut map = self.collect_snapshot().await?;
        Ok(map.remove(service_id))
    }

    async fn collect_snapshot(&self) -> Result<HashMap<String, ServiceInfo>, BusError> {
        let now = Utc::now();
        let registry_read = self.bus.drain_backlog(
            &StreamKind::Registry.stream_name(&self.prefix),
            &StreamKind::Registry.wildcard(&self.prefix),
            ReadFrom::Beginning,
        );
        let status_read = self.bus.drain_backlog(
            &StreamKind::Status.stream_name(&self.prefix),
            &StreamKind::Status.wildcard(&self.prefix),
            ReadFrom::Since(now - ChronoDuration::hours(STATUS_LOOKBACK_HOURS)),
        );
        let heartbeat_read = self.bus.drain_backlog(
            &StreamKind::Heartbeat.stream_name(&self.prefix),
            &StreamKind::Heartbeat.wildcard(&self.prefix),
            ReadFrom::Since(now - ChronoDuration::minutes(HEARTBEAT_LOOKBACK_MINUTES)),
        );

        let (registry, status, heartbeats) =
            tokio::join!(registry_read, status_read, heartbeat_read);

        let mut services = HashMap::new();
        for payload in registry? {
            apply_registry_event(&mut services, &payload);
        }
        for payload in status? {
            apply_status_report(&mut services, &payload);
        }
        for payload in heartbeats? {
            apply_heartbeat(&mut services, &payload);
        }

        compute_uptime(&mut services, Utc::now());
        tracing::debug!(services = services.len(), "snapshot collected");
        Ok(services)
    }

    // ----- follow mode -----

    /// Start following: collect a snapshot, then keep all three streams open
    /// and continuously update the local map, firing callbacks on changes.
    pub async fn start_following(&self) -> Result<(), BusError> {
        if self.follow.lock().is_some() {
            tracing::warn!("already following services");
            return Ok(());
        }

        *self.services.lock() = self.collect_snapshot().await?;
        tracing::info!(services = self.services.lock().len(), "following services");

        let token = CancellationToken::new();
        let mut tasks = Vec::new();
        for kind in StreamKind::all() {
            let (mut rx, reader) = self
                .bus
                .follow(
                    &kind.stream_name(&self.prefix),
                    &kind.wildcard(&self.prefix),
                    ReadFrom::LastPerSubject,
                    token.clone(),
                )
                .await?;
            tasks.push(reader);

            let services = Arc::clone(&self.services);
            let callbacks = Arc::clone(&self.callbacks);
            tasks.push(tokio::spawn(async move {
                while let Some(payload) = rx.recv().await {
                    let (updated, event_kind) = {
                        let mut map = services.lock();
                        let (id, event_kind) = match kind {
                            StreamKind::Registry => (
                                apply_registry_event(&mut map, &payload),
                                payload.get("event").and_then(Value::as_str).map(str::to_string),
                            ),
                            StreamKind::Status => (apply_status_report(&mut map, &payload), None),
                            StreamKind::Heartbeat => (apply_heartbeat(&mut map, &payload), None),
                        };
                        compute_uptime(&mut map, Utc::now());
                        (id.and_then(|id| map.get(&id).cloned()), event_kind)
                    };

                    let Some(info) = updated else { continue };
                    let callbacks = callbacks.lock();
                    if let Some(cb) = &callbacks.on_update {
                        cb(&info);
                    }
                    match event_kind.as_deref() {
                        Some("start") => {
                            if let Some(cb) = &callbacks.on_start {
                                cb(&info);
                            }
                        }
                        Some("stop") => {
                            if let Some(cb) = &callbacks.on_stop {
                                cb(&info);
                            }
                        }
                        _ => {}
                    }
                }
            }));
        }

        *self.follow.lock() = Some(FollowState { token, tasks });
        Ok(())
    }

    /// Cancel the follow readers. Idempotent.
    pub async fn stop_following(&self) {
        let Some(state) = self.follow.lock().take() else { return };
        state.token.cancel();
        for task in state.tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "follow task join failed");
                }
            }
        }
        tracing::info!("service following stopped");
    }

    /// Current services from follow-mode state.
    pub fn current_services(&self, include_stopped: bool) -> Vec<ServiceInfo> {
        let mut services: Vec<ServiceInfo> = self.services.lock().values().cloned().collect();
        if !include_stopped {
            services.retain(ServiceInfo::is_running);
        }
        services.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        services
    }

    /// Current record of one service from follow-mode state.
    pub fn current_service(&self, service_id: &str) -> Option<ServiceInfo> {
        self.services.lock().get(service_id).cloned()
    }
}

fn timestamp_of(payload: &Value) -> Option<DateTime<Utc>> {
    payload
        .get("timestamp")
        .and_then(|v| serde_json::from_value::<UtcTimestamp>(v.clone()).ok())
        .map(UtcTimestamp::datetime)
}

fn entry<'a>(
    services: &'a mut HashMap<String, ServiceInfo>,
    service_id: &str,
) -> &'a mut ServiceInfo {
    services
        .entry(service_id.to_string())
        .or_insert_with(|| ServiceInfo::new(service_id))
}

/// Fold one registry event into the map; registry owns lifecycle fields.
/// Returns the touched service id.
pub(crate) fn apply_registry_event(
    services: &mut HashMap<String, ServiceInfo>,
    payload: &Value,
) -> Option<String> {
    let service_id = payload.get("service_id").and_then(Value::as_str)?;
    let event = payload.get("event").and_then(Value::as_str)?;
    let timestamp = timestamp_of(payload);
    let info = entry(services, service_id);

    if let Some(runner_id) = payload.get("runner_id").and_then(Value::as_str) {
        info.runner_id = Some(runner_id.to_string());
    }
    if let Some(parent) = payload.get("parent").and_then(Value::as_str) {
        info.parent = Some(parent.to_string());
    }

    match event {
        "declared" => info.declared = true,
        "start" => {
            if timestamp.is_some() {
                info.start_time = timestamp;
            }
            // A (re)start clears any previous stop.
            info.stop_time = None;
            if let Some(hostname) = payload.get("hostname").and_then(Value::as_str) {
                info.hostname = Some(hostname.to_string());
            }
            if let Some(pid) = payload.get("pid").and_then(Value::as_u64) {
                info.pid = u32::try_from(pid).ok();
            }
        }
        "stop" | "crashed" | "failed" => {
            if timestamp.is_some() {
                info.stop_time = timestamp;
            }
        }
        // A restart announcement changes nothing yet; the following start
        // event carries the new lifecycle fields.
        "restarting" => {}
        other => tracing::debug!(event = other, "unrecognized registry event"),
    }
    Some(service_id.to_string())
}

/// Fold one status report into the map; the status stream owns current
/// state. Returns the touched service id.
pub(crate) fn apply_status_report(
    services: &mut HashMap<String, ServiceInfo>,
    payload: &Value,
) -> Option<String> {
    let service_id = payload.get("name").and_then(Value::as_str)?;
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .and_then(Status::parse)?;
    let info = entry(services, service_id);
    info.status = status;
    info.status_message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    if let Some(parent) = payload.get("parent").and_then(Value::as_str) {
        info.parent = Some(parent.to_string());
    }
    if let Some(timestamp) = timestamp_of(payload) {
        info.last_status_update = Some(timestamp);
    }
    Some(service_id.to_string())
}

/// Fold one heartbeat into the map; heartbeats own liveness. Returns the
/// touched service id.
pub(crate) fn apply_heartbeat(
    services: &mut HashMap<String, ServiceInfo>,
    payload: &Value,
) -> Option<String> {
    let service_id = payload.get("service_id").and_then(Value::as_str)?;
    let timestamp = timestamp_of(payload)?;
    let info = entry(services, service_id);
    if info.last_heartbeat.map_or(true, |current| timestamp > current) {
        info.last_heartbeat = Some(timestamp);
    }
    Some(service_id.to_string())
}

/// Uptime for services that started and have not stopped.
pub(crate) fn compute_uptime(services: &mut HashMap<String, ServiceInfo>, now: DateTime<Utc>) {
    for info in services.values_mut() {
        info.uptime_seconds = match (info.start_time, info.stop_time) {
            (Some(start), None) => Some((now - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
