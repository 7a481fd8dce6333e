// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tcs-runtime: In-process service hosting.
//!
//! [`ProcessContext`] owns the per-process bus connection and configuration;
//! [`ServiceController`] drives one service instance through its lifecycle;
//! [`ServiceCatalog`] and [`ServiceRegistry`] resolve declared service types
//! to compiled-in implementations.

pub mod catalog;
pub mod context;
pub mod controller;
pub mod monitoring;
pub mod registry;
pub mod service;
pub mod services;

pub use catalog::{bind_config, BaseServiceConfig, ServiceCatalog, ServiceConfig, ServiceFactory};
pub use context::{ContextError, ContextOptions, ProcessContext};
pub use controller::{ControllerError, ServiceController};
pub use monitoring::create_monitor;
pub use registry::ServiceRegistry;
pub use service::{Service, ServiceContext, ServiceError, ServiceOutcome};
