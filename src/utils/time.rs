//! Timestamp helpers
//!
//! Every timestamp the system creates is truncated to whole milliseconds and
//! serialized as `YYYY-MM-DDTHH:MM:SS.mmmZ`, so a value written by one client
//! reads back bit-identical on every other client.

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};

use crate::error::{AppError, AppResult};

/// Current wall-clock time at millisecond precision
pub fn now() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(at)
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp coming from outside the process
pub fn parse_timestamp(field: &str, value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| truncate_to_millis(dt.with_timezone(&Utc)))
        .map_err(|e| AppError::validation(format!("Invalid {field} '{value}': {e}")))
}

pub fn millis_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> i64 {
    (*to - *from).num_milliseconds()
}
