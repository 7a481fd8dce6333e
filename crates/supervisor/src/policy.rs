// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart decisions: policy application and the sliding restart window.

use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tcs_core::RestartPolicy;

/// Restart behavior declared for one service.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartSettings {
    pub policy: RestartPolicy,
    /// Delay before a restart attempt (`restart_sec`).
    pub delay: Duration,
    /// Maximum restarts within the window; 0 means unlimited.
    pub max: u32,
    /// Sliding window for restart counting (`restart_window`).
    pub window: Duration,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            policy: RestartPolicy::No,
            delay: Duration::from_secs_f64(5.0),
            max: 0,
            window: Duration::from_secs_f64(60.0),
        }
    }
}

impl RestartSettings {
    /// Parse the restart fields out of one declared-service entry.
    /// Unknown policy strings fall back to `no` with a warning.
    pub fn from_service_entry(entry: &Map<String, Value>) -> Self {
        let defaults = Self::default();

        let policy = match entry.get("restart") {
            Some(Value::String(s)) => {
                serde_json::from_value::<RestartPolicy>(Value::String(s.clone())).unwrap_or_else(
                    |_| {
                        tracing::warn!(policy = %s, "unknown restart policy, not restarting");
                        RestartPolicy::No
                    },
                )
            }
            _ => RestartPolicy::No,
        };

        let seconds = |key: &str, fallback: Duration| -> Duration {
            entry
                .get(key)
                .and_then(Value::as_f64)
                .map(|v| Duration::from_secs_f64(v.max(0.0)))
                .unwrap_or(fallback)
        };

        Self {
            policy,
            delay: seconds("restart_sec", defaults.delay),
            max: entry
                .get("restart_max")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max),
            window: seconds("restart_window", defaults.window),
        }
    }
}

/// Timestamps of successful restarts inside the current window.
#[derive(Debug, Default)]
pub struct RestartTracker {
    history: Vec<Instant>,
}

impl RestartTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps older than `now - window`. Must run before any
    /// decision that depends on the count.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        self.history.retain(|ts| now.duration_since(*ts) < window);
    }

    pub fn record(&mut self, now: Instant) {
        self.history.push(now);
    }

    pub fn count(&self) -> u32 {
        self.history.len() as u32
    }
}

/// Outcome of evaluating a non-clean exit against the restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashVerdict {
    /// The policy alone wants a restart for this exit code.
    pub policy_wants: bool,
    /// The restart limit is exhausted within the window.
    pub limit_reached: bool,
    /// Restarts in the current window (after pruning).
    pub restart_count: u32,
}

impl CrashVerdict {
    pub fn will_restart(&self) -> bool {
        self.policy_wants && !self.limit_reached
    }
}

/// Prune the tracker and evaluate policy plus limit for one crash.
pub fn evaluate_crash(
    settings: &RestartSettings,
    tracker: &mut RestartTracker,
    exit_code: i32,
    now: Instant,
) -> CrashVerdict {
    tracker.prune(now, settings.window);
    let restart_count = tracker.count();
    CrashVerdict {
        policy_wants: settings.policy.wants_restart(exit_code),
        limit_reached: settings.max > 0 && restart_count >= settings.max,
        restart_count,
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
