//! Timestamp utilities
//!
//! Every conversion here is pure: epoch values are interpreted as UTC and the
//! result never depends on the process-local timezone.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

/// Convert epoch milliseconds to a timezone-naive UTC timestamp
///
/// Millisecond precision is kept. Returns `None` when the value is outside
/// the representable range.
pub fn epoch_millis_to_timestamp(ts: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ts).map(|dt| dt.naive_utc())
}

/// Microseconds since the epoch for a naive UTC timestamp (Arrow/Parquet encoding)
pub fn timestamp_micros(start_time: &NaiveDateTime) -> i64 {
    start_time.and_utc().timestamp_micros()
}

/// Calendar decomposition of a play timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub hour: u32,
    /// Day of month (1-31)
    pub day: u32,
    /// ISO-8601 week of year (1-53)
    pub week: u32,
    pub month: u32,
    pub year: i32,
    /// Day of week, 1 = Sunday .. 7 = Saturday
    pub weekday: u32,
}

impl TimeParts {
    pub fn from_timestamp(start_time: &NaiveDateTime) -> Self {
        Self {
            hour: start_time.hour(),
            day: start_time.day(),
            week: start_time.iso_week().week(),
            month: start_time.month(),
            year: start_time.year(),
            weekday: start_time.weekday().number_from_sunday(),
        }
    }
}
