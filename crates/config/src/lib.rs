// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tcs-config: Layered configuration with priority-ordered sources.
//!
//! Sources (defaults, YAML file, bus subject, CLI args) each carry a numeric
//! priority; higher priorities overlay lower ones via deep merge. String
//! scalars support `${VAR}` / `${VAR:-default}` environment expansion.

pub mod expand;
pub mod manager;
pub mod source;

pub use expand::expand_env;
pub use manager::ConfigManager;
pub use source::{ArgsSource, BusSource, ConfigSource, DefaultsSource, FileSource};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config source {name} is a {found}, expected a mapping")]
    NotAMapping { name: String, found: &'static str },
}
