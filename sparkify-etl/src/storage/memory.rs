//! In-memory storage for tests

use super::{SourceRecord, TableOutput, TableStorage, WriteSummary};
use crate::error::{EtlError, EtlResult};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Datasets held as JSON values; written tables are captured by name
#[derive(Default)]
pub struct MemoryStorage {
    datasets: HashMap<String, Vec<Value>>,
    tables: Mutex<Vec<TableOutput>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the records served for `dataset_path`
    pub fn with_dataset(mut self, dataset_path: &str, records: Vec<Value>) -> Self {
        self.datasets.insert(dataset_path.to_string(), records);
        self
    }

    /// Latest write of the named table
    pub fn table(&self, name: &str) -> Option<TableOutput> {
        self.lock_tables()
            .iter()
            .rev()
            .find(|t| t.name == name)
            .cloned()
    }

    /// Names of written tables, in write order
    pub fn write_order(&self) -> Vec<String> {
        self.lock_tables().iter().map(|t| t.name.clone()).collect()
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, Vec<TableOutput>> {
        // A poisoned lock only means another test thread panicked mid-write
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TableStorage for MemoryStorage {
    fn read_records(&self, dataset_path: &str) -> EtlResult<Vec<SourceRecord>> {
        match self.datasets.get(dataset_path) {
            Some(values) if !values.is_empty() => Ok(values
                .iter()
                .enumerate()
                .map(|(index, value)| SourceRecord {
                    path: PathBuf::from(format!("memory://{}", dataset_path)),
                    index,
                    value: value.clone(),
                })
                .collect()),
            _ => Err(EtlError::SourceNotFound {
                pattern: format!("memory://{}", dataset_path),
            }),
        }
    }

    fn write_table(&self, table: &TableOutput) -> EtlResult<WriteSummary> {
        let mut tables = self.lock_tables();
        tables.retain(|t| t.name != table.name);
        tables.push(table.clone());
        Ok(WriteSummary {
            table: table.name.clone(),
            rows: table.num_rows(),
            files: 1,
        })
    }
}
