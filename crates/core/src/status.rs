// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service status levels and aggregation.

use serde::{Deserialize, Serialize};

/// Health state of a service or monitored component.
///
/// Severity ordering (low to high):
/// `Unknown < Startup < Shutdown < Ok ≈ Idle ≈ Busy < Degraded ≈ Warning < Error < Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unknown,
    Startup,
    Shutdown,
    Ok,
    Idle,
    Busy,
    Degraded,
    Warning,
    Error,
    Failed,
}

impl Status {
    /// Severity rank used by ordering comparisons. Statuses with the same
    /// rank are peers (e.g. Ok/Idle/Busy).
    pub fn severity(self) -> u8 {
        match self {
            Status::Unknown => 0,
            Status::Startup => 1,
            Status::Shutdown => 2,
            Status::Ok | Status::Idle | Status::Busy => 3,
            Status::Degraded | Status::Warning => 4,
            Status::Error => 5,
            Status::Failed => 6,
        }
    }

    /// True when the status indicates a healthy (if possibly degraded) state.
    pub fn is_healthy(self) -> bool {
        matches!(
            self,
            Status::Ok | Status::Idle | Status::Busy | Status::Degraded | Status::Warning
        )
    }

    /// True when the service is up, including the startup phase.
    pub fn is_operational(self) -> bool {
        self == Status::Startup || self.is_healthy()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unknown => "unknown",
            Status::Startup => "startup",
            Status::Shutdown => "shutdown",
            Status::Ok => "ok",
            Status::Idle => "idle",
            Status::Busy => "busy",
            Status::Degraded => "degraded",
            Status::Warning => "warning",
            Status::Error => "error",
            Status::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "unknown" => Some(Status::Unknown),
            "startup" => Some(Status::Startup),
            "shutdown" => Some(Status::Shutdown),
            "ok" => Some(Status::Ok),
            "idle" => Some(Status::Idle),
            "busy" => Some(Status::Busy),
            "degraded" => Some(Status::Degraded),
            "warning" => Some(Status::Warning),
            "error" => Some(Status::Error),
            "failed" => Some(Status::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation precedence: the first status in this list present in the
/// input wins. Realizes both the severity ordering and the documented
/// tie-breaks (warning over degraded, busy over idle over ok).
const AGGREGATION_PRECEDENCE: [Status; 9] = [
    Status::Failed,
    Status::Error,
    Status::Warning,
    Status::Degraded,
    Status::Startup,
    Status::Shutdown,
    Status::Busy,
    Status::Idle,
    Status::Ok,
];

/// Aggregate a set of statuses into the single worst one.
///
/// Empty input, or input containing only `Unknown`, yields `Unknown`.
pub fn aggregate_status(statuses: &[Status]) -> Status {
    for candidate in AGGREGATION_PRECEDENCE {
        if statuses.contains(&candidate) {
            return candidate;
        }
    }
    Status::Unknown
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
