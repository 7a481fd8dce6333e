// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serialized status reports.

use crate::status::Status;
use crate::timestamp::UtcTimestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status report for one monitored entity.
///
/// `details` carries metric payloads and recursive child reports; `parent`
/// is a display-grouping hint attached only to top-level reports on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub name: String,
    pub status: Status,
    pub timestamp: UtcTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl StatusReport {
    pub fn new(name: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            status,
            timestamp: UtcTimestamp::now(),
            message: None,
            details: None,
            parent: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
