//! Song extractor
//!
//! Reads song metadata and projects the `songs` and `artists` dimensions.
//! Neither projection is deduplicated: repeated metadata entries in the source
//! produce repeated rows.

use super::decode_records;
use crate::error::EtlResult;
use crate::storage::TableStorage;
use sparkify_common::models::{Artist, Song, SongRecord};
use tracing::info;

/// Read every song metadata record under `song_data_path`
pub fn extract_songs(storage: &dyn TableStorage, song_data_path: &str) -> EtlResult<Vec<SongRecord>> {
    let records = storage.read_records(song_data_path)?;
    let total = records.len();
    let songs: Vec<SongRecord> = decode_records(records);
    info!("Decoded {} of {} song records", songs.len(), total);
    Ok(songs)
}

pub fn songs_table(records: &[SongRecord]) -> Vec<Song> {
    records.iter().map(Song::from).collect()
}

pub fn artists_table(records: &[SongRecord]) -> Vec<Artist> {
    records.iter().map(Artist::from).collect()
}
