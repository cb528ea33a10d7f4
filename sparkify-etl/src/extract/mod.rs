//! Source extractors
//!
//! - [`songs`]: song metadata -> `songs` and `artists` dimensions
//! - [`logs`]: activity log -> play events, `users` and `time` dimensions

pub mod logs;
pub mod songs;

use crate::storage::SourceRecord;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Apply a typed read schema to raw records
///
/// Field-level problems are absorbed by the schema (mistyped or missing
/// fields become null). A record that is not a JSON object at all cannot be
/// mapped onto a row and is skipped with a warning.
pub fn decode_records<T: DeserializeOwned>(records: Vec<SourceRecord>) -> Vec<T> {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        if !record.value.is_object() {
            warn!(
                "Skipping non-object record {} in {}",
                record.index,
                record.path.display()
            );
            continue;
        }
        match serde_json::from_value::<T>(record.value) {
            Ok(row) => rows.push(row),
            Err(e) => warn!(
                "Skipping undecodable record {} in {}: {}",
                record.index,
                record.path.display(),
                e
            ),
        }
    }
    rows
}
