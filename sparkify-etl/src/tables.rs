//! Arrow schemas and Parquet encoding for the star-schema tables
//!
//! These schemas are the contract for downstream readers of the output
//! location. Column order follows the table definitions; partition columns
//! are part of the schema and are moved into the directory layout on write.

use crate::error::EtlResult;
use crate::storage::TableOutput;
use arrow::array::{
    ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use sparkify_common::config::OutputCompression;
use sparkify_common::models::{Artist, Song, SongPlay, TimeRow, User};
use sparkify_common::time::timestamp_micros;
use std::io::Write;
use std::sync::Arc;

pub const SONGS_TABLE: &str = "songs";
pub const ARTISTS_TABLE: &str = "artists";
pub const USERS_TABLE: &str = "users";
pub const TIME_TABLE: &str = "time";
pub const SONGPLAYS_TABLE: &str = "songplays";

pub const SONGS_PARTITION_BY: &[&str] = &["year", "artist_id"];
pub const TIME_PARTITION_BY: &[&str] = &["year", "month"];
pub const SONGPLAYS_PARTITION_BY: &[&str] = &["year", "month"];

// ============================================================================
// Schema Definitions
// ============================================================================

fn start_time_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

pub fn songs_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("song_id", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("title", DataType::Utf8, true),
        Field::new("duration", DataType::Float64, true),
        Field::new("year", DataType::Int32, true),
    ]))
}

pub fn artists_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("artist_name", DataType::Utf8, true),
        Field::new("artist_latitude", DataType::Float64, true),
        Field::new("artist_longitude", DataType::Float64, true),
        Field::new("artist_location", DataType::Utf8, true),
    ]))
}

pub fn users_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("user_id", DataType::Int32, false),
        Field::new("first_name", DataType::Utf8, true),
        Field::new("last_name", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("level", DataType::Utf8, true),
    ]))
}

pub fn time_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("start_time", start_time_type(), true),
        Field::new("hour", DataType::Int32, true),
        Field::new("day", DataType::Int32, true),
        Field::new("week", DataType::Int32, true),
        Field::new("month", DataType::Int32, true),
        Field::new("year", DataType::Int32, true),
        Field::new("weekday", DataType::Int32, true),
    ]))
}

pub fn songplays_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("songplay_id", DataType::Int64, false),
        Field::new("start_time", start_time_type(), true),
        Field::new("user_id", DataType::Int32, true),
        Field::new("level", DataType::Utf8, true),
        Field::new("song_id", DataType::Utf8, true),
        Field::new("artist_id", DataType::Utf8, true),
        Field::new("session_id", DataType::Int64, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("user_agent", DataType::Utf8, true),
        Field::new("year", DataType::Int32, true),
        Field::new("month", DataType::Int32, true),
    ]))
}

// ============================================================================
// Column helpers
// ============================================================================

fn utf8<T>(rows: &[T], f: impl Fn(&T) -> Option<&str>) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn float64<T>(rows: &[T], f: impl Fn(&T) -> Option<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn int32<T>(rows: &[T], f: impl Fn(&T) -> Option<i32>) -> ArrayRef {
    Arc::new(Int32Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn int64<T>(rows: &[T], f: impl Fn(&T) -> Option<i64>) -> ArrayRef {
    Arc::new(Int64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn timestamp<T>(rows: &[T], f: impl Fn(&T) -> Option<&NaiveDateTime>) -> ArrayRef {
    Arc::new(TimestampMicrosecondArray::from(
        rows.iter()
            .map(|r| f(r).map(timestamp_micros))
            .collect::<Vec<_>>(),
    ))
}

// Calendar parts fit comfortably in i32
fn part(value: Option<u32>) -> Option<i32> {
    value.map(|v| v as i32)
}

// ============================================================================
// Encoders
// ============================================================================

pub fn songs_batch(rows: &[Song]) -> EtlResult<RecordBatch> {
    Ok(RecordBatch::try_new(
        songs_schema(),
        vec![
            utf8(rows, |r| r.song_id.as_deref()),
            utf8(rows, |r| r.artist_id.as_deref()),
            utf8(rows, |r| r.title.as_deref()),
            float64(rows, |r| r.duration),
            int32(rows, |r| r.year),
        ],
    )?)
}

pub fn artists_batch(rows: &[Artist]) -> EtlResult<RecordBatch> {
    Ok(RecordBatch::try_new(
        artists_schema(),
        vec![
            utf8(rows, |r| r.artist_id.as_deref()),
            utf8(rows, |r| r.artist_name.as_deref()),
            float64(rows, |r| r.artist_latitude),
            float64(rows, |r| r.artist_longitude),
            utf8(rows, |r| r.artist_location.as_deref()),
        ],
    )?)
}

pub fn users_batch(rows: &[User]) -> EtlResult<RecordBatch> {
    Ok(RecordBatch::try_new(
        users_schema(),
        vec![
            Arc::new(Int32Array::from(
                rows.iter().map(|r| r.user_id).collect::<Vec<_>>(),
            )) as ArrayRef,
            utf8(rows, |r| r.first_name.as_deref()),
            utf8(rows, |r| r.last_name.as_deref()),
            utf8(rows, |r| r.gender.as_deref()),
            utf8(rows, |r| r.level.as_deref()),
        ],
    )?)
}

pub fn time_batch(rows: &[TimeRow]) -> EtlResult<RecordBatch> {
    Ok(RecordBatch::try_new(
        time_schema(),
        vec![
            timestamp(rows, |r| r.start_time.as_ref()),
            int32(rows, |r| part(r.hour)),
            int32(rows, |r| part(r.day)),
            int32(rows, |r| part(r.week)),
            int32(rows, |r| part(r.month)),
            int32(rows, |r| r.year),
            int32(rows, |r| part(r.weekday)),
        ],
    )?)
}

pub fn songplays_batch(rows: &[SongPlay]) -> EtlResult<RecordBatch> {
    Ok(RecordBatch::try_new(
        songplays_schema(),
        vec![
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.songplay_id).collect::<Vec<_>>(),
            )) as ArrayRef,
            timestamp(rows, |r| r.start_time.as_ref()),
            int32(rows, |r| r.user_id),
            utf8(rows, |r| r.level.as_deref()),
            utf8(rows, |r| r.song_id.as_deref()),
            utf8(rows, |r| r.artist_id.as_deref()),
            int64(rows, |r| r.session_id),
            utf8(rows, |r| r.location.as_deref()),
            utf8(rows, |r| r.user_agent.as_deref()),
            int32(rows, |r| r.year),
            int32(rows, |r| part(r.month)),
        ],
    )?)
}

// ============================================================================
// Table outputs
// ============================================================================

pub fn songs_output(rows: &[Song]) -> EtlResult<TableOutput> {
    Ok(TableOutput::new(SONGS_TABLE, songs_batch(rows)?, SONGS_PARTITION_BY))
}

pub fn artists_output(rows: &[Artist]) -> EtlResult<TableOutput> {
    Ok(TableOutput::new(ARTISTS_TABLE, artists_batch(rows)?, &[]))
}

pub fn users_output(rows: &[User]) -> EtlResult<TableOutput> {
    Ok(TableOutput::new(USERS_TABLE, users_batch(rows)?, &[]))
}

pub fn time_output(rows: &[TimeRow]) -> EtlResult<TableOutput> {
    Ok(TableOutput::new(TIME_TABLE, time_batch(rows)?, TIME_PARTITION_BY))
}

pub fn songplays_output(rows: &[SongPlay]) -> EtlResult<TableOutput> {
    Ok(TableOutput::new(
        SONGPLAYS_TABLE,
        songplays_batch(rows)?,
        SONGPLAYS_PARTITION_BY,
    ))
}

// ============================================================================
// Parquet
// ============================================================================

fn writer_properties(compression: OutputCompression) -> WriterProperties {
    let writer = KeyValue {
        key: "writer".to_string(),
        value: Some("sparkify-etl".to_string()),
    };
    let compression = match compression {
        OutputCompression::Snappy => Compression::SNAPPY,
        OutputCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
        OutputCompression::Uncompressed => Compression::UNCOMPRESSED,
    };
    WriterProperties::builder()
        .set_compression(compression)
        .set_key_value_metadata(Some(vec![writer]))
        .build()
}

/// Encode one batch as a complete Parquet file
pub fn write_parquet<W: Write + Send>(
    sink: W,
    batch: &RecordBatch,
    compression: OutputCompression,
) -> EtlResult<()> {
    let props = writer_properties(compression);
    let mut writer = ArrowWriter::try_new(sink, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}
