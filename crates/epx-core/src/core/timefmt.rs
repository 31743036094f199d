// epx-core/src/core/timefmt.rs
// ============================================================================
// Module: EPX Time Formatting
// Description: UTC timestamp helpers shared by entities and repositories.
// Purpose: Keep one second-granular, round-trippable timestamp rendering.
// Dependencies: time, thiserror
// ============================================================================

//! ## Overview
//! Every persisted timestamp in the control plane is UTC at second
//! granularity: object keys embed `HHMMSS`, the wire uses RFC 3339, and the
//! repositories round-trip the same rendering. Sub-second precision is
//! truncated at creation so that a job's `created_at` always reproduces the
//! exact key prefix it produced the first time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure to parse a persisted timestamp.
#[derive(Debug, Error)]
#[error("invalid timestamp {value:?}: {reason}")]
pub struct TimeParseError {
    /// Raw value that failed to parse.
    pub value: String,
    /// Parser-reported reason.
    pub reason: String,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current UTC time truncated to whole seconds.
#[must_use]
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

/// Renders a UTC timestamp as RFC 3339 with a `Z` suffix.
///
/// Rendering is infallible: components are written digit by digit instead of
/// going through the fallible `time` formatter.
#[must_use]
pub fn format_utc(ts: OffsetDateTime) -> String {
    let date = ts.date();
    let clock = ts.time();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        date.year(),
        u8::from(date.month()),
        date.day(),
        clock.hour(),
        clock.minute(),
        clock.second()
    )
}

/// Parses an RFC 3339 timestamp produced by [`format_utc`].
///
/// # Errors
///
/// Returns [`TimeParseError`] when the value is not valid RFC 3339.
pub fn parse_utc(value: &str) -> Result<OffsetDateTime, TimeParseError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|err| TimeParseError {
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
