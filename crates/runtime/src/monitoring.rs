// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor factory for embedding applications.
//!
//! External code that wants to appear in the fleet view calls
//! [`create_monitor`]: the process context is initialized lazily (which
//! discovers an installed bus connection when no configuration is present),
//! and the monitor degrades to local-only reporting when no bus is
//! reachable.

use crate::context::{ContextOptions, ProcessContext};
use tcs_monitor::{BusMonitor, BusMonitorOptions};

/// Build a bus-backed monitor wired to the process-wide connection.
///
/// With `name` absent, a unique name is generated from the executable name
/// and a random suffix.
pub async fn create_monitor(name: Option<&str>, options: BusMonitorOptions) -> BusMonitor {
    let name = match name {
        Some(name) => name.to_string(),
        None => generated_name(),
    };

    let sink = match ProcessContext::initialize(ContextOptions::default()).await {
        Ok(context) => context.sink(),
        Err(e) => {
            tracing::warn!(error = %e, "process context unavailable, monitoring is local-only");
            None
        }
    };
    if sink.is_none() {
        tracing::warn!(monitor = %name, "no bus connection, monitor will not publish");
    }
    BusMonitor::new(name, sink, options)
}

fn generated_name() -> String {
    let executable = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "monitor".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{executable}-{}", &suffix[..8])
}

#[cfg(test)]
#[path = "monitoring_tests.rs"]
mod tests;
