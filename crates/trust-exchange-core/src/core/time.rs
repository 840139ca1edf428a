// crates/trust-exchange-core/src/core/time.rs
// ============================================================================
// Module: Trust Exchange Time Model
// Description: Absolute UTC timestamps with a single canonical wire form.
// Purpose: Keep deadlines absolute and timestamp bytes identical across parties.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Timestamps are absolute UTC instants held at millisecond precision. They
//! render in exactly one form, `YYYY-MM-DDTHH:MM:SS.mmmZ`, because the
//! rendered string is embedded in signed payloads: two parties that format
//! the same instant differently would produce signatures that fail
//! cross-verification.
//!
//! The core never reads wall-clock time directly; hosts supply the current
//! time through [`crate::interfaces::Clock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;
use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Nanoseconds per millisecond.
const NANOS_PER_MILLI: u32 = 1_000_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when constructing or parsing timestamps.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Input was not a valid RFC 3339 timestamp.
    #[error("invalid timestamp: {0}")]
    Parse(String),
    /// Value is outside the representable range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Absolute UTC timestamp with millisecond precision.
///
/// # Invariants
/// - The offset is always UTC.
/// - Sub-millisecond precision is truncated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Creates a timestamp from any offset date-time, normalizing to UTC
    /// milliseconds.
    #[must_use]
    pub fn from_datetime(value: OffsetDateTime) -> Self {
        let utc = value.to_offset(UtcOffset::UTC);
        let millis_only = (utc.nanosecond() / NANOS_PER_MILLI) * NANOS_PER_MILLI;
        Self(utc.replace_nanosecond(millis_only).unwrap_or(utc))
    }

    /// Creates a timestamp from unix epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] when the value cannot be represented.
    pub fn from_unix_millis(millis: i64) -> Result<Self, TimestampError> {
        let nanos = i128::from(millis) * i128::from(NANOS_PER_MILLI);
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map(Self)
            .map_err(|err| TimestampError::OutOfRange(err.to_string()))
    }

    /// Parses an RFC 3339 / ISO-8601 timestamp, normalizing to UTC milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Parse`] when the input is not valid RFC 3339.
    pub fn parse(text: &str) -> Result<Self, TimestampError> {
        OffsetDateTime::parse(text.trim(), &Rfc3339)
            .map(Self::from_datetime)
            .map_err(|err| TimestampError::Parse(err.to_string()))
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub fn unix_millis(&self) -> i64 {
        let millis = self.0.unix_timestamp_nanos() / i128::from(NANOS_PER_MILLI);
        i64::try_from(millis).unwrap_or(i64::MAX)
    }

    /// Returns the timestamp advanced by `duration`, or `None` on overflow.
    #[must_use]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        let delta = time::Duration::try_from(duration).ok()?;
        self.0.checked_add(delta).map(Self::from_datetime)
    }

    /// Returns the time remaining until `later`, or zero when `later` is not
    /// after `self`.
    #[must_use]
    pub fn duration_until(self, later: Self) -> Duration {
        Duration::try_from(later.0 - self.0).unwrap_or(Duration::ZERO)
    }

    /// Renders the canonical wire form (`YYYY-MM-DDTHH:MM:SS.mmmZ`).
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
            ))
            .map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
