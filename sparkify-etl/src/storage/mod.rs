//! Storage collaborator
//!
//! The pipeline reads raw JSON records from an input location and writes
//! columnar tables to an output location through [`TableStorage`]. Writes
//! always overwrite: the destination table is fully replaced.
//!
//! - [`LocalStorage`]: filesystem input + hive-partitioned Parquet output
//! - [`MemoryStorage`]: in-memory records and captured tables, for tests

mod local;
mod memory;
pub mod partition;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use crate::error::EtlResult;
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// One raw JSON record with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// File the record was read from
    pub path: PathBuf,
    /// Position of the record within its file
    pub index: usize,
    pub value: Value,
}

/// A table ready to be persisted
#[derive(Debug, Clone)]
pub struct TableOutput {
    pub name: String,
    pub batch: RecordBatch,
    /// Columns used for directory partitioning, outermost first
    pub partition_by: Vec<String>,
}

impl TableOutput {
    pub fn new(name: &str, batch: RecordBatch, partition_by: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            batch,
            partition_by: partition_by.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Outcome of a single table write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: String,
    pub rows: usize,
    /// Data files produced (one per partition)
    pub files: usize,
}

/// Reads source records and writes output tables
pub trait TableStorage {
    /// Read every JSON record under `dataset_path` (relative to the input base)
    ///
    /// Fails with `SourceNotFound` when no file matches and with `Parse` when
    /// a file is not valid JSON.
    fn read_records(&self, dataset_path: &str) -> EtlResult<Vec<SourceRecord>>;

    /// Replace the named table at the output location with `table`
    fn write_table(&self, table: &TableOutput) -> EtlResult<WriteSummary>;
}

impl<T: TableStorage + ?Sized> TableStorage for Arc<T> {
    fn read_records(&self, dataset_path: &str) -> EtlResult<Vec<SourceRecord>> {
        (**self).read_records(dataset_path)
    }

    fn write_table(&self, table: &TableOutput) -> EtlResult<WriteSummary> {
        (**self).write_table(table)
    }
}
