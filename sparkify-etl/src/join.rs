//! Join / derivation engine
//!
//! Builds the `songplays` fact table from play events and song metadata:
//!
//! 1. **Id assignment**: plays are stable-sorted by `(ts, arrival)` and cut
//!    into fixed-size partitions; each id is the partition offset plus the
//!    row position inside it. Ids strictly increase with that order but are
//!    not contiguous across partitions.
//! 2. **Approximate song match**: a play matches a song when the title and
//!    artist name are equal and the lengths differ by less than
//!    [`DURATION_TOLERANCE_SECS`]. A play without a match keeps null
//!    `song_id`/`artist_id`; no play is ever dropped.
//! 3. **Fact assembly**: one row per play, with `year`/`month` taken from
//!    the start time.

use crate::extract::logs::PlayEvent;
use sparkify_common::config::ID_PARTITION_BITS;
use sparkify_common::models::{SongPlay, SongRecord};
use sparkify_common::time::TimeParts;
use std::collections::HashMap;
use tracing::debug;

/// Maximum length difference, in seconds, for a play to match a song
pub const DURATION_TOLERANCE_SECS: f64 = 2.0;

const PARTITION_SHIFT: u32 = ID_PARTITION_BITS;

/// Song metadata usable as a join target
#[derive(Debug, Clone, PartialEq)]
pub struct SongCandidate {
    pub duration: f64,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
}

/// Song metadata indexed by `(title, artist_name)`
///
/// Records missing the title, artist name, or duration can never satisfy the
/// match condition and are left out.
#[derive(Debug, Default)]
pub struct SongIndex {
    by_key: HashMap<(String, String), Vec<SongCandidate>>,
    len: usize,
}

impl SongIndex {
    pub fn build(records: &[SongRecord]) -> Self {
        let mut index = Self::default();
        for record in records {
            let (Some(title), Some(artist_name), Some(duration)) =
                (&record.title, &record.artist_name, record.duration)
            else {
                continue;
            };
            index
                .by_key
                .entry((title.clone(), artist_name.clone()))
                .or_default()
                .push(SongCandidate {
                    duration,
                    song_id: record.song_id.clone(),
                    artist_id: record.artist_id.clone(),
                });
            index.len += 1;
        }
        debug!("Song index holds {} joinable records", index.len);
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Best candidate for a play: smallest length difference under the
    /// tolerance, earliest indexed on equal difference
    pub fn lookup(&self, title: &str, artist: &str, length: f64) -> Option<&SongCandidate> {
        self.by_key
            .get(&(title.to_string(), artist.to_string()))?
            .iter()
            .map(|c| ((length - c.duration).abs(), c))
            .filter(|(diff, _)| *diff < DURATION_TOLERANCE_SECS)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, c)| c)
    }

    fn match_play(&self, play: &PlayEvent) -> Option<&SongCandidate> {
        match (&play.song, &play.artist, play.length) {
            (Some(song), Some(artist), Some(length)) => self.lookup(song, artist, length),
            _ => None,
        }
    }
}

/// Order plays by `(ts, arrival)` and give each a songplay id
///
/// Plays without `ts` sort first. `rows_per_partition` bounds how many ids a
/// partition hands out before the next partition offset is used.
pub fn assign_songplay_ids(
    plays: &[PlayEvent],
    rows_per_partition: usize,
) -> Vec<(i64, &PlayEvent)> {
    let rows_per_partition = rows_per_partition.max(1);

    let mut ordered: Vec<&PlayEvent> = plays.iter().collect();
    ordered.sort_by_key(|p| (p.ts, p.arrival));

    ordered
        .chunks(rows_per_partition)
        .enumerate()
        .flat_map(|(partition, chunk)| {
            let offset = (partition as i64) << PARTITION_SHIFT;
            chunk
                .iter()
                .enumerate()
                .map(move |(row, play)| (offset + row as i64, *play))
        })
        .collect()
}

/// Join counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched: usize,
}

/// Assemble the `songplays` fact table, ordered by songplay id
pub fn build_songplays(
    plays: &[PlayEvent],
    songs: &SongIndex,
    rows_per_partition: usize,
) -> (Vec<SongPlay>, JoinStats) {
    let mut stats = JoinStats::default();
    let rows = assign_songplay_ids(plays, rows_per_partition)
        .into_iter()
        .map(|(songplay_id, play)| {
            let song = songs.match_play(play);
            if song.is_some() {
                stats.matched += 1;
            } else {
                stats.unmatched += 1;
            }
            fact_row(songplay_id, play, song)
        })
        .collect();
    (rows, stats)
}

fn fact_row(songplay_id: i64, play: &PlayEvent, song: Option<&SongCandidate>) -> SongPlay {
    let parts = play.start_time.as_ref().map(TimeParts::from_timestamp);
    SongPlay {
        songplay_id,
        start_time: play.start_time,
        user_id: play.user_id,
        level: play.level.clone(),
        song_id: song.and_then(|s| s.song_id.clone()),
        artist_id: song.and_then(|s| s.artist_id.clone()),
        session_id: play.session_id,
        location: play.location.clone(),
        user_agent: play.user_agent.clone(),
        year: parts.map(|p| p.year),
        month: parts.map(|p| p.month),
    }
}
