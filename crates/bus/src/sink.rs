// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publishing seam between producers and the wire.
//!
//! Monitors and runners publish through [`MessageSink`] so their event
//! emission can be exercised in tests without a NATS server.

use crate::{Bus, BusError};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn publish(&self, subject: String, payload: Value) -> Result<(), BusError>;
}

#[async_trait]
impl MessageSink for Bus {
    async fn publish(&self, subject: String, payload: Value) -> Result<(), BusError> {
        self.publish_json(subject, &payload).await
    }
}

/// In-memory sink that records published messages, for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct CollectingSink {
    messages: parking_lot::Mutex<Vec<(String, Value)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl CollectingSink {
    pub fn new() -> Self {
        Self { messages: parking_lot::Mutex::new(Vec::new()) }
    }

    /// Snapshot of everything published so far, in publication order.
    pub fn messages(&self) -> Vec<(String, Value)> {
        self.messages.lock().clone()
    }

    /// Subjects only, for order-of-events assertions.
    pub fn subjects(&self) -> Vec<String> {
        self.messages.lock().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl MessageSink for CollectingSink {
    async fn publish(&self, subject: String, payload: Value) -> Result<(), BusError> {
        self.messages.lock().push((subject, payload));
        Ok(())
    }
}
