// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-service records collected from the streams.

use chrono::{DateTime, Utc};
use tcs_core::Status;

/// Heartbeat freshness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatState {
    /// Heard within the alive window (3x heartbeat interval).
    Alive,
    /// Heard recently but overdue.
    Stale,
    /// Silent for too long, or a running service with no heartbeat at all.
    Dead,
    /// Stopped service with no heartbeat; expected, not alarming.
    None,
}

const ALIVE_WINDOW_SECS: f64 = 30.0;
const STALE_WINDOW_SECS: f64 = 120.0;

impl std::fmt::Display for HeartbeatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HeartbeatState::Alive => "alive",
            HeartbeatState::Stale => "stale",
            HeartbeatState::Dead => "dead",
            HeartbeatState::None => "none",
        };
        f.write_str(s)
    }
}

/// Everything the observer knows about one service.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub service_id: String,
    pub status: Status,
    pub status_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_status_update: Option<DateTime<Utc>>,
    pub uptime_seconds: Option<f64>,
    pub runner_id: Option<String>,
    pub hostname: Option<String>,
    pub pid: Option<u32>,
    pub parent: Option<String>,
    /// True when the service appeared in a launcher's configuration.
    pub declared: bool,
}

impl ServiceInfo {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            status: Status::Unknown,
            status_message: None,
            start_time: None,
            stop_time: None,
            last_heartbeat: None,
            last_status_update: None,
            uptime_seconds: None,
            runner_id: None,
            hostname: None,
            pid: None,
            parent: None,
            declared: false,
        }
    }

    /// Running means operational status and no recorded stop.
    pub fn is_running(&self) -> bool {
        self.status.is_operational() && self.stop_time.is_none()
    }

    pub fn heartbeat_state(&self, now: DateTime<Utc>) -> HeartbeatState {
        let Some(last) = self.last_heartbeat else {
            // A running service without any heartbeat is a zombie; a stopped
            // one is simply quiet.
            return if self.is_running() { HeartbeatState::Dead } else { HeartbeatState::None };
        };
        let age = (now - last).num_milliseconds() as f64 / 1000.0;
        if age < ALIVE_WINDOW_SECS {
            HeartbeatState::Alive
        } else if age < STALE_WINDOW_SECS {
            HeartbeatState::Stale
        } else {
            HeartbeatState::Dead
        }
    }

    /// Fresh means the last heartbeat is inside the alive window.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.heartbeat_state(now) == HeartbeatState::Alive
    }

    /// Human-readable uptime, `N/A` when unknown.
    pub fn uptime_str(&self) -> String {
        let Some(uptime) = self.uptime_seconds else {
            return "N/A".to_string();
        };
        let seconds = uptime.max(0.0) as u64;
        if seconds < 60 {
            format!("{seconds}s")
        } else if seconds < 3600 {
            format!("{}m", seconds / 60)
        } else if seconds < 86_400 {
            format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
        } else {
            format!("{}d {}h", seconds / 86_400, (seconds % 86_400) / 3600)
        }
    }
}

#[cfg(test)]
#[path = "info_tests.rs"]
mod tests;
