// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tcs-bus: NATS JetStream transport for the service fleet.
//!
//! Owns the connection, provisions the three retained streams (registry,
//! status, heartbeat), and provides publish helpers plus snapshot/follow
//! readers. Everything above this crate talks subjects and JSON payloads.

pub mod conn;
pub mod reader;
pub mod shared;
pub mod sink;
pub mod subjects;

pub use conn::{Bus, DEFAULT_HOST, DEFAULT_PORT};
pub use reader::ReadFrom;
pub use sink::MessageSink;
#[cfg(any(test, feature = "test-support"))]
pub use sink::CollectingSink;
pub use subjects::StreamKind;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to NATS at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to provision stream {stream}: {message}")]
    Stream { stream: String, message: String },
    #[error("publish to {subject} failed: {message}")]
    Publish { subject: String, message: String },
    #[error("reader on {subject} failed: {message}")]
    Read { subject: String, message: String },
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
