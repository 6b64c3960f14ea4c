//! # Temporal Types — UTC Timestamps at Store Precision
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to microseconds.
//!
//! Postgres `timestamptz` keeps microseconds. Truncating at construction
//! means a record written to the database and read back compares equal to
//! the in-memory original, which the ledger tests rely on.
//!
//! Non-UTC strings are **rejected** by [`Timestamp::parse`]; clock-in and
//! clock-out payloads coming from devices go through
//! [`Timestamp::parse_lenient`], which converts any offset to UTC.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ShiftwiseError;

/// A UTC-only timestamp, truncated to microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_micros(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-microseconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_micros(dt))
    }

    /// Parse an RFC 3339 string with a `Z` suffix.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not RFC 3339 or carries an explicit
    /// offset (even `+00:00`).
    pub fn parse(s: &str) -> Result<Self, ShiftwiseError> {
        if !s.ends_with('Z') {
            return Err(ShiftwiseError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, ShiftwiseError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            ShiftwiseError::InvalidTimestamp(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_micros(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The UTC calendar date of this instant.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Whole minutes elapsed from `earlier` to `self`, rounded down.
    ///
    /// Returns `None` when `earlier` is not strictly before `self`.
    pub fn minutes_since(&self, earlier: &Timestamp) -> Option<i64> {
        if earlier.0 >= self.0 {
            return None;
        }
        Some((self.0 - earlier.0).num_minutes())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = dt.nanosecond();
    dt.with_nanosecond(nanos - nanos % 1_000).unwrap_or(dt)
}
