// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle event payloads published on the registry stream.
//!
//! Serializes with `{"event": "start", ...fields}` format. The runner owning
//! a service is the sole publisher of these events for its service id.

use crate::restart::RestartPolicy;
use crate::status::Status;
use crate::timestamp::UtcTimestamp;
use serde::{Deserialize, Serialize};

/// Events that mark transitions in a supervised service's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// Service is part of a launcher's formal configuration.
    Declared {
        service_id: String,
        timestamp: UtcTimestamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_id: Option<String>,
        restart_policy: RestartPolicy,
    },

    Start {
        service_id: String,
        timestamp: UtcTimestamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_id: Option<String>,
        status: Status,
        hostname: String,
        pid: u32,
    },

    Stop {
        service_id: String,
        timestamp: UtcTimestamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_id: Option<String>,
        status: Status,
        /// `completed` for child-initiated exits, `force_killed` when the
        /// runner had to escalate past the graceful-termination window.
        reason: String,
        exit_code: i32,
    },

    Crashed {
        service_id: String,
        timestamp: UtcTimestamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_id: Option<String>,
        /// `error` when a restart will follow, `failed` otherwise.
        status: Status,
        exit_code: i32,
        restart_policy: RestartPolicy,
        will_restart: bool,
    },

    Restarting {
        service_id: String,
        timestamp: UtcTimestamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_id: Option<String>,
        status: Status,
        /// 1-based attempt number within the current restart window.
        restart_attempt: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_restarts: Option<u32>,
    },

    Failed {
        service_id: String,
        timestamp: UtcTimestamp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_id: Option<String>,
        status: Status,
        /// `restart_limit_reached` or `restart_failed`.
        reason: String,
        restart_count: u32,
    },
}

impl RegistryEvent {
    /// Event name as it appears in the registry subject.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::Declared { .. } => "declared",
            RegistryEvent::Start { .. } => "start",
            RegistryEvent::Stop { .. } => "stop",
            RegistryEvent::Crashed { .. } => "crashed",
            RegistryEvent::Restarting { .. } => "restarting",
            RegistryEvent::Failed { .. } => "failed",
        }
    }

    pub fn service_id(&self) -> &str {
        match self {
            RegistryEvent::Declared { service_id, .. }
            | RegistryEvent::Start { service_id, .. }
            | RegistryEvent::Stop { service_id, .. }
            | RegistryEvent::Crashed { service_id, .. }
            | RegistryEvent::Restarting { service_id, .. }
            | RegistryEvent::Failed { service_id, .. } => service_id,
        }
    }

    pub fn timestamp(&self) -> UtcTimestamp {
        match self {
            RegistryEvent::Declared { timestamp, .. }
            | RegistryEvent::Start { timestamp, .. }
            | RegistryEvent::Stop { timestamp, .. }
            | RegistryEvent::Crashed { timestamp, .. }
            | RegistryEvent::Restarting { timestamp, .. }
            | RegistryEvent::Failed { timestamp, .. } => *timestamp,
        }
    }

    /// Full subject this event is published on.
    pub fn subject(&self, prefix: &str) -> String {
        format!("{}.registry.{}.{}", prefix, self.kind(), self.service_id())
    }
}

/// Periodic liveness message, independent of status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub service_id: String,
    pub timestamp: UtcTimestamp,
    pub status: Status,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
