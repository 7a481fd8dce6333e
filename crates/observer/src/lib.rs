// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tcs-observer: Fleet state reconstruction from the retained streams.
//!
//! [`FleetObserver`] fuses the registry, status, and heartbeat streams into
//! per-service records, either as a one-shot snapshot or as a continuously
//! updated follow-mode map with user callbacks.

pub mod info;
pub mod observer;

pub use info::{HeartbeatState, ServiceInfo};
pub use observer::FleetObserver;
