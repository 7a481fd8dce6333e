// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess entry hosting a single service.
//!
//! Spawned by the process launcher as
//! `tcs-service <service_type> [config_file] [variant] --runner-id ...`,
//! and also usable standalone for development runs.

use clap::Parser;
use std::process::ExitCode;
use tcs_core::{ServiceId, DEFAULT_VARIANT};
use tcs_runtime::{
    ContextOptions, ProcessContext, ServiceCatalog, ServiceController, ServiceRegistry,
};
use tcs_supervisor::cli::ServiceArgs;
use tcs_supervisor::signal::shutdown_signal;

fn fatal(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = ServiceArgs::parse();
    // Existing environment variables win over .env entries.
    let _ = dotenvy::dotenv();
    tcs_supervisor::logging::init(args.no_color);

    if let Some(path) = &args.config_file {
        if !path.exists() {
            tracing::error!(path = %path.display(), "configuration file not found");
            return fatal(1);
        }
    }

    let variant = args.variant.as_deref().unwrap_or(DEFAULT_VARIANT);
    let service_id = match ServiceId::new(&args.service_type, variant) {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "invalid service identity");
            return fatal(1);
        }
    };

    if !args.no_banner {
        tracing::info!("TCS service host: {}", service_id);
    }

    let context = match ProcessContext::initialize(ContextOptions {
        config_file: args.config_file.clone(),
        args_overlay: None,
    })
    .await
    {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize process context");
            return fatal(1);
        }
    };

    let raw = context.config_manager().raw_config().await;
    let registry = ServiceRegistry::from_config(&raw);
    let controller = ServiceController::create(
        &context,
        &registry,
        ServiceCatalog::builtin(),
        service_id,
        args.runner_id.clone(),
        args.parent_name.clone(),
    );

    if let Err(e) = controller.initialize().await {
        tracing::error!(error = %e, "controller initialization failed");
        context.shutdown().await;
        return fatal(1);
    }
    if let Err(e) = controller.start_service().await {
        tracing::error!(error = %e, "service start failed");
        context.shutdown().await;
        return fatal(1);
    }

    let outcome = tokio::select! {
        outcome = controller.wait_outcome() => Some(outcome),
        _ = shutdown_signal() => None,
    };

    let exit_code = match outcome {
        Some(Ok(outcome)) => {
            tracing::info!(?outcome, "service finished");
            0
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "service failed");
            e.exit_code()
        }
        None => 0,
    };

    context.shutdown().await;
    if exit_code == 0 {
        ExitCode::SUCCESS
    } else {
        fatal(exit_code)
    }
}
