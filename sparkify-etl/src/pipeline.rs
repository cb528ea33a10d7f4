//! Pipeline driver
//!
//! Runs the song extractor, then the log extractor, writing tables in the
//! fixed order songs → artists → users → time → songplays. Each write
//! replaces the destination table. A failed write aborts the run; tables
//! written before it stay replaced.

use crate::error::EtlResult;
use crate::extract::{logs, songs};
use crate::join::{build_songplays, SongIndex};
use crate::session::EtlSession;
use crate::storage::{TableOutput, WriteSummary};
use crate::tables;
use sparkify_common::models::SongRecord;
use tracing::info;

/// What one run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Table writes in the order they happened
    pub tables: Vec<WriteSummary>,
    pub song_records: usize,
    pub log_records: usize,
    pub play_events: usize,
    pub invalid_user_ids: usize,
    pub songplays_matched: usize,
    pub songplays_unmatched: usize,
}

impl RunSummary {
    pub fn rows_written(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }
}

fn write(session: &EtlSession, output: TableOutput, summary: &mut RunSummary) -> EtlResult<()> {
    let written = session.storage().write_table(&output)?;
    info!(
        "Wrote table '{}': {} rows in {} files",
        written.table, written.rows, written.files
    );
    summary.tables.push(written);
    Ok(())
}

/// Build and write `songs` and `artists`; returns the loaded song metadata
pub fn process_song_data(
    session: &EtlSession,
    summary: &mut RunSummary,
) -> EtlResult<Vec<SongRecord>> {
    let config = session.config();
    let records = songs::extract_songs(session.storage(), &config.song_data_path)?;
    summary.song_records = records.len();

    write(session, tables::songs_output(&songs::songs_table(&records))?, summary)?;
    write(
        session,
        tables::artists_output(&songs::artists_table(&records))?,
        summary,
    )?;
    Ok(records)
}

/// Build and write `users`, `time`, and `songplays`
///
/// `song_records` is the metadata the play events are joined against; it
/// only needs to be loaded, not written.
pub fn process_log_data(
    session: &EtlSession,
    song_records: &[SongRecord],
    summary: &mut RunSummary,
) -> EtlResult<()> {
    let config = session.config();
    let events = logs::extract_log_events(session.storage(), &config.log_data_path)?;
    let (plays, stats) = logs::filter_plays(events);
    info!(
        "{} of {} log records are song plays",
        stats.plays, stats.records
    );
    summary.log_records = stats.records;
    summary.play_events = stats.plays;
    summary.invalid_user_ids = stats.invalid_user_ids;

    write(session, tables::users_output(&logs::users_table(&plays))?, summary)?;
    write(session, tables::time_output(&logs::time_table(&plays))?, summary)?;

    let index = SongIndex::build(song_records);
    let (songplays, join_stats) =
        build_songplays(&plays, &index, config.output.rows_per_partition);
    info!(
        "Song match: {} matched, {} without metadata",
        join_stats.matched, join_stats.unmatched
    );
    summary.songplays_matched = join_stats.matched;
    summary.songplays_unmatched = join_stats.unmatched;

    write(session, tables::songplays_output(&songplays)?, summary)?;
    Ok(())
}

/// Run both extractors in order
pub fn run(session: &EtlSession) -> EtlResult<RunSummary> {
    let mut summary = RunSummary::default();
    let song_records = process_song_data(session, &mut summary)?;
    process_log_data(session, &song_records, &mut summary)?;
    Ok(summary)
}
