// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart policies for supervised services.

use serde::{Deserialize, Serialize};

/// When a runner should restart its service after a non-clean exit.
///
/// Mirrors the systemd `Restart=` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart.
    #[default]
    No,
    /// Restart on any exit, subject to the restart limit.
    Always,
    /// Restart when the exit code is non-zero.
    OnFailure,
    /// Restart on signal or abort exits (exit code above 128 or negative).
    OnAbnormal,
}

impl RestartPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::Always => "always",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::OnAbnormal => "on-abnormal",
        }
    }

    /// Policy verdict for a given exit code, ignoring restart limits.
    pub fn wants_restart(self, exit_code: i32) -> bool {
        match self {
            RestartPolicy::No => false,
            RestartPolicy::Always => true,
            RestartPolicy::OnFailure => exit_code != 0,
            RestartPolicy::OnAbnormal => exit_code > 128 || exit_code < 0,
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "restart_tests.rs"]
mod tests;
