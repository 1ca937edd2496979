// crates/sdlc-loop-core/src/core/time.rs
// ============================================================================
// Module: SDLC Loop Time Model
// Description: Canonical UTC timestamp representation for loop records.
// Purpose: Keep every time-dependent computation deterministic and testable
// by threading an explicit `now` through every call site.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The loop controller never reads wall-clock time directly. Every function
//! that needs "now" accepts it as an explicit [`Timestamp`] parameter so
//! tests can drive the state machine, lease, and outbox logic with literal
//! clock values instead of racing the system clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ops::Add;

use serde::Deserialize;
use serde::Serialize;
use time::Duration as TimeDuration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A UTC instant used throughout loop, lease, outbox, and gate records.
///
/// # Invariants
/// - Always UTC; callers must convert before constructing one.
/// - Equality and ordering are instant-based, not representation-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Builds a timestamp from a UTC `OffsetDateTime`.
    #[must_use]
    pub const fn from_offset_date_time(value: OffsetDateTime) -> Self {
        Self(value)
    }

    /// Builds a timestamp from unix milliseconds.
    #[must_use]
    pub fn from_unix_millis(millis: i64) -> Self {
        let nanos = i128::from(millis) * 1_000_000;
        Self(OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH))
    }

    /// Parses an RFC 3339 timestamp string.
    ///
    /// # Errors
    ///
    /// Returns an error when `value` is not a valid RFC 3339 string.
    pub fn parse_rfc3339(value: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(value, &Rfc3339).map(Self)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub fn unix_millis(self) -> i64 {
        (self.0.unix_timestamp_nanos() / 1_000_000) as i64
    }

    /// Returns the inner `OffsetDateTime`.
    #[must_use]
    pub const fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Renders the timestamp as an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns an error if formatting fails (only possible for out-of-range
    /// representations, which this type never constructs).
    pub fn to_rfc3339(self) -> Result<String, time::error::Format> {
        self.0.format(&Rfc3339)
    }

    /// Adds a duration expressed in milliseconds, saturating on overflow.
    #[must_use]
    pub fn plus_millis(self, millis: i64) -> Self {
        self + TimeDuration::milliseconds(millis)
    }
}

impl Add<TimeDuration> for Timestamp {
    type Output = Self;

    fn add(self, rhs: TimeDuration) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

/// RFC 3339 serde adapter for [`OffsetDateTime`].
mod rfc3339 {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    /// Serializes an `OffsetDateTime` as an RFC 3339 string.
    pub(super) fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let rendered = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&rendered)
    }

    /// Deserializes an RFC 3339 string into an `OffsetDateTime`.
    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
    }
}
