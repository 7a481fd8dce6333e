// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown signal handling.

use tokio::signal::unix::{signal, SignalKind};

/// Resolves when SIGINT or SIGTERM arrives.
pub async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            // Fall back to SIGINT only.
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to wait for ctrl-c");
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to wait for ctrl-c");
            }
            tracing::info!("received SIGINT");
        }
        _ = terminate.recv() => {
            tracing::info!("received SIGTERM");
        }
    }
}
