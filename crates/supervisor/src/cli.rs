// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surfaces of the launcher and service binaries.

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Default configuration file location.
pub const DEFAULT_CONFIG_FILE: &str = "config/services.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LauncherFlavor {
    /// All services in the launcher process.
    InProcess,
    /// Each service in its own subprocess.
    Process,
}

/// Unified TCS daemon launcher.
#[derive(Debug, Parser)]
#[command(name = "tcsd", about = "Telescope Control Services daemon", version)]
pub struct TcsdArgs {
    /// Path to the services config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Suppress the startup banner.
    #[arg(long)]
    pub no_banner: bool,

    /// Disable colored logging.
    #[arg(long)]
    pub no_color: bool,

    /// Launcher flavor.
    #[arg(short = 'l', long, value_enum, default_value = "in-process")]
    pub launcher: LauncherFlavor,

    /// [process only] Seconds to wait for graceful shutdown before force-kill.
    #[arg(long, default_value_t = 1.0)]
    pub terminate_delay: f64,
}

/// Subprocess entry hosting a single service.
#[derive(Debug, Parser)]
#[command(name = "tcs-service", about = "Run one TCS service", version)]
pub struct ServiceArgs {
    /// Service type to run (must be in the service catalog).
    pub service_type: String,

    /// Path to the services config file.
    pub config_file: Option<PathBuf>,

    /// Instance variant (default: dev).
    pub variant: Option<String>,

    /// Runner identity assigned by the supervising launcher.
    #[arg(long)]
    pub runner_id: Option<String>,

    /// Parent entity name for hierarchical display.
    #[arg(long)]
    pub parent_name: Option<String>,

    /// Suppress the startup banner.
    #[arg(long)]
    pub no_banner: bool,

    /// Disable colored logging.
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("configuration file not found: {0}")]
pub struct MissingConfigFile(pub String);

/// Resolve the effective config file.
///
/// An explicitly provided path must exist; the default path is optional and
/// its absence means "run with empty configuration".
pub fn determine_config_file(
    config_arg: Option<&Path>,
) -> Result<Option<PathBuf>, MissingConfigFile> {
    match config_arg {
        Some(path) => {
            if path.exists() {
                tracing::info!(path = %path.display(), "using config file");
                Ok(Some(path.to_path_buf()))
            } else {
                Err(MissingConfigFile(path.display().to_string()))
            }
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                tracing::info!(path = DEFAULT_CONFIG_FILE, "using default config file");
                Ok(Some(default.to_path_buf()))
            } else {
                tracing::info!("no config file, continuing with empty configuration");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
