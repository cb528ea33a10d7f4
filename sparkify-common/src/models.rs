//! Row models
//!
//! Raw input records carry an explicit read schema: every field is named,
//! typed, and defaults to `None` when missing or mistyped. Output rows are the
//! star-schema tables derived from them.

use crate::coerce;
use crate::time::TimeParts;
use chrono::NaiveDateTime;
use serde::Deserialize;

/// Song metadata record as found in the song dataset
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SongRecord {
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub song_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub artist_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub title: Option<String>,
    /// Track length in seconds
    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "coerce::opt_i32")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub artist_name: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub artist_latitude: Option<f64>,
    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub artist_longitude: Option<f64>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub artist_location: Option<String>,
}

/// User activity record as found in the log dataset
///
/// `userId` stays a raw string here; the integer cast happens in the log
/// extractor so that a bad id degrades to null without touching other fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "userId", default, deserialize_with = "coerce::opt_string")]
    pub user_id: Option<String>,
    #[serde(rename = "firstName", default, deserialize_with = "coerce::opt_string")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName", default, deserialize_with = "coerce::opt_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub level: Option<String>,
    /// Event time, milliseconds since the epoch
    #[serde(default, deserialize_with = "coerce::opt_i64")]
    pub ts: Option<i64>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub song: Option<String>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub artist: Option<String>,
    /// Played length in seconds
    #[serde(default, deserialize_with = "coerce::opt_f64")]
    pub length: Option<f64>,
    #[serde(rename = "sessionId", default, deserialize_with = "coerce::opt_i64")]
    pub session_id: Option<i64>,
    #[serde(default, deserialize_with = "coerce::opt_string")]
    pub location: Option<String>,
    #[serde(rename = "userAgent", default, deserialize_with = "coerce::opt_string")]
    pub user_agent: Option<String>,
}

/// `songs` dimension row
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub year: Option<i32>,
}

impl From<&SongRecord> for Song {
    fn from(record: &SongRecord) -> Self {
        Self {
            song_id: record.song_id.clone(),
            artist_id: record.artist_id.clone(),
            title: record.title.clone(),
            duration: record.duration,
            year: record.year,
        }
    }
}

/// `artists` dimension row
#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub artist_location: Option<String>,
}

impl From<&SongRecord> for Artist {
    fn from(record: &SongRecord) -> Self {
        Self {
            artist_id: record.artist_id.clone(),
            artist_name: record.artist_name.clone(),
            artist_latitude: record.artist_latitude,
            artist_longitude: record.artist_longitude,
            artist_location: record.artist_location.clone(),
        }
    }
}

/// `users` dimension row, one per user id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

/// `time` dimension row, one per play event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRow {
    pub start_time: Option<NaiveDateTime>,
    pub hour: Option<u32>,
    pub day: Option<u32>,
    pub week: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub weekday: Option<u32>,
}

impl TimeRow {
    /// Decompose a start time; a missing start time yields an all-null row.
    pub fn from_start_time(start_time: Option<NaiveDateTime>) -> Self {
        let parts = start_time.as_ref().map(TimeParts::from_timestamp);
        Self {
            start_time,
            hour: parts.map(|p| p.hour),
            day: parts.map(|p| p.day),
            week: parts.map(|p| p.week),
            month: parts.map(|p| p.month),
            year: parts.map(|p| p.year),
            weekday: parts.map(|p| p.weekday),
        }
    }
}

/// `songplays` fact row
#[derive(Debug, Clone, PartialEq)]
pub struct SongPlay {
    pub songplay_id: i64,
    pub start_time: Option<NaiveDateTime>,
    pub user_id: Option<i32>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}
