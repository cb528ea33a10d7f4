//! Log extractor
//!
//! Reads the activity log, keeps only song plays, and derives the `users` and
//! `time` dimensions from them.

use super::decode_records;
use crate::error::EtlResult;
use crate::storage::TableStorage;
use chrono::NaiveDateTime;
use sparkify_common::coerce::parse_i32;
use sparkify_common::models::{LogEvent, TimeRow, User};
use sparkify_common::time::epoch_millis_to_timestamp;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Page value marking a song play
pub const PLAY_PAGE: &str = "NextSong";

/// A song play with its derived fields
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    /// Position in the ingested log, used as the secondary ordering key
    pub arrival: usize,
    pub user_id: Option<i32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub ts: Option<i64>,
    pub start_time: Option<NaiveDateTime>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl PlayEvent {
    pub fn from_log(arrival: usize, event: LogEvent) -> Self {
        Self {
            arrival,
            user_id: event.user_id.as_deref().and_then(parse_i32),
            first_name: event.first_name,
            last_name: event.last_name,
            gender: event.gender,
            level: event.level,
            ts: event.ts,
            start_time: event.ts.and_then(epoch_millis_to_timestamp),
            song: event.song,
            artist: event.artist,
            length: event.length,
            session_id: event.session_id,
            location: event.location,
            user_agent: event.user_agent,
        }
    }
}

/// Counters gathered while filtering the log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogStats {
    pub records: usize,
    pub plays: usize,
    /// Plays whose `userId` did not cast to an integer
    pub invalid_user_ids: usize,
}

pub fn is_play(event: &LogEvent) -> bool {
    event
        .page
        .as_deref()
        .map(|page| page.eq_ignore_ascii_case(PLAY_PAGE))
        .unwrap_or(false)
}

/// Read every log record under `log_data_path`
pub fn extract_log_events(storage: &dyn TableStorage, log_data_path: &str) -> EtlResult<Vec<LogEvent>> {
    let records = storage.read_records(log_data_path)?;
    let total = records.len();
    let events: Vec<LogEvent> = decode_records(records);
    info!("Decoded {} of {} log records", events.len(), total);
    Ok(events)
}

/// Keep song plays only, casting `userId` to an integer
///
/// A `userId` that does not cast becomes a null `user_id`; the play is kept.
pub fn filter_plays(events: Vec<LogEvent>) -> (Vec<PlayEvent>, LogStats) {
    let mut stats = LogStats {
        records: events.len(),
        ..LogStats::default()
    };

    let plays: Vec<PlayEvent> = events
        .into_iter()
        .enumerate()
        .filter(|(_, event)| is_play(event))
        .map(|(arrival, event)| PlayEvent::from_log(arrival, event))
        .collect();

    stats.plays = plays.len();
    stats.invalid_user_ids = plays.iter().filter(|p| p.user_id.is_none()).count();
    if stats.invalid_user_ids > 0 {
        debug!(
            "{} plays have a missing or non-numeric userId",
            stats.invalid_user_ids
        );
    }
    (plays, stats)
}

/// One row per user id, taken from that user's most recent play
///
/// Most recent means greatest `ts`; plays without `ts` rank below any
/// timestamped play. On equal `ts` the later-ingested play wins. Plays with a
/// null `user_id` do not contribute. Rows come out in ascending `user_id`.
pub fn users_table(plays: &[PlayEvent]) -> Vec<User> {
    let mut latest: BTreeMap<i32, &PlayEvent> = BTreeMap::new();
    for play in plays {
        let Some(user_id) = play.user_id else {
            continue;
        };
        latest
            .entry(user_id)
            .and_modify(|current| {
                if (play.ts, play.arrival) > (current.ts, current.arrival) {
                    *current = play;
                }
            })
            .or_insert(play);
    }

    // Keyed by user_id, so each user appears exactly once
    latest
        .into_iter()
        .map(|(user_id, play)| User {
            user_id,
            first_name: play.first_name.clone(),
            last_name: play.last_name.clone(),
            gender: play.gender.clone(),
            level: play.level.clone(),
        })
        .collect()
}

/// One time row per play, in play order; repeated timestamps are kept
pub fn time_table(plays: &[PlayEvent]) -> Vec<TimeRow> {
    plays
        .iter()
        .map(|play| TimeRow::from_start_time(play.start_time))
        .collect()
}
