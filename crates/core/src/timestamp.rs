// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UTC timestamps with the seven-element array wire format.
//!
//! All bus payloads carry timestamps as `[year, month, day, hour, minute,
//! second, microsecond]` arrays, matching what the fleet tooling expects.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// A UTC instant serialized as a seven-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UtcTimestamp(pub DateTime<Utc>);

impl UtcTimestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Seconds elapsed since this timestamp, measured against `now`.
    /// Negative when the timestamp lies in the future.
    pub fn age_seconds(self, now: DateTime<Utc>) -> f64 {
        (now - self.0).num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0
    }
}

impl From<DateTime<Utc>> for UtcTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl Serialize for UtcTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dt = self.0;
        let mut seq = serializer.serialize_seq(Some(7))?;
        seq.serialize_element(&dt.year())?;
        seq.serialize_element(&dt.month())?;
        seq.serialize_element(&dt.day())?;
        seq.serialize_element(&dt.hour())?;
        seq.serialize_element(&dt.minute())?;
        seq.serialize_element(&dt.second())?;
        seq.serialize_element(&(dt.nanosecond() / 1_000))?;
        seq.end()
    }
}

struct ArrayVisitor;

impl<'de> Visitor<'de> for ArrayVisitor {
    type Value = UtcTimestamp;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a [year, month, day, hour, minute, second, microsecond] array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut next = |name: &'static str| -> Result<i64, A::Error> {
            seq.next_element::<i64>()?.ok_or_else(|| de::Error::custom(format!("missing {name}")))
        };
        let year = next("year")?;
        let month = next("month")?;
        let day = next("day")?;
        let hour = next("hour")?;
        let minute = next("minute")?;
        let second = next("second")?;
        let micros = next("microsecond")?;

        let dt = Utc
            .with_ymd_and_hms(
                year as i32,
                month as u32,
                day as u32,
                hour as u32,
                minute as u32,
                second as u32,
            )
            .single()
            .ok_or_else(|| de::Error::custom("invalid calendar date"))?;
        let dt = dt + chrono::Duration::microseconds(micros);
        Ok(UtcTimestamp(dt))
    }
}

impl<'de> Deserialize<'de> for UtcTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(ArrayVisitor)
    }
}

#[cfg(test)]
#[path = "timestamp_tests.rs"]
mod tests;
