// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified TCS daemon launcher.
//!
//! ```text
//! tcsd --config config/services.yaml                    # in-process mode
//! tcsd --launcher process --config config/services.yaml # subprocess mode
//! ```

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tcs_runtime::{ContextOptions, ProcessContext, ServiceCatalog};
use tcs_supervisor::cli::{determine_config_file, LauncherFlavor, TcsdArgs};
use tcs_supervisor::{launcher_name, Launcher, LauncherKind};

#[tokio::main]
async fn main() -> ExitCode {
    let args = TcsdArgs::parse();
    // Existing environment variables win over .env entries.
    if let Ok(path) = dotenvy::dotenv() {
        eprintln!("loaded environment from {}", path.display());
    }
    tcs_supervisor::logging::init(args.no_color);

    let config_file = match determine_config_file(args.config.as_deref()) {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("{e}");
            tracing::error!("explicitly provided config file must exist, exiting");
            return ExitCode::from(1);
        }
    };

    let kind = match args.launcher {
        LauncherFlavor::InProcess => LauncherKind::InProcess,
        LauncherFlavor::Process => LauncherKind::Process {
            terminate_delay: Duration::from_secs_f64(args.terminate_delay.max(0.0)),
        },
    };

    let context = match ProcessContext::initialize(ContextOptions {
        config_file: config_file.clone(),
        args_overlay: None,
    })
    .await
    {
        Ok(context) => context,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize process context");
            return ExitCode::from(1);
        }
    };

    let config_key = config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();
    let launcher_id = launcher_name(kind.type_name(), &[&config_key, &cwd, &host]);

    if !args.no_banner {
        tracing::info!("============================================================");
        tracing::info!("TCS - Telescope Control Services");
        tracing::info!("Launcher: {} ({})", launcher_id, kind.type_name());
        tracing::info!("============================================================");
    }

    let launcher = match Launcher::initialize(
        Arc::clone(&context),
        kind,
        launcher_id,
        ServiceCatalog::builtin(),
    )
    .await
    {
        Ok(launcher) => launcher,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize launcher");
            context.shutdown().await;
            return ExitCode::from(1);
        }
    };

    launcher.declare_services().await;
    if !launcher.start_all().await {
        // A failed service never takes down the launcher; the rest keep
        // running and the failure is visible on the registry stream.
        tracing::error!("one or more services failed to start");
    }

    launcher.run().await;
    ExitCode::SUCCESS
}
