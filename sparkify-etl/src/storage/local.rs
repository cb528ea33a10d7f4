//! Filesystem storage
//!
//! Input: every `*.json` file below `<input_base>/<dataset_path>`, visited in
//! sorted path order. A file may hold a single JSON document or a stream of
//! newline-delimited documents; a top-level array contributes one record per
//! element. Hidden entries and entries starting with `_` are skipped.
//!
//! Output: `<output_base>/<table>/<col>=<value>/.../part-00000.parquet` plus a
//! `_SUCCESS` marker at the table root once every part is written.

use super::partition::split_partitions;
use super::{SourceRecord, TableOutput, TableStorage, WriteSummary};
use crate::error::{EtlError, EtlResult};
use crate::tables::write_parquet;
use serde_json::Value;
use sparkify_common::config::{Credentials, OutputCompression};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

const PART_FILE_NAME: &str = "part-00000.parquet";
const SUCCESS_MARKER: &str = "_SUCCESS";

/// Storage rooted at two local directories
pub struct LocalStorage {
    input_base: PathBuf,
    output_base: PathBuf,
    compression: OutputCompression,
    credentials: Option<Credentials>,
}

impl LocalStorage {
    /// Create storage over local directories
    ///
    /// Remote object-store URLs (`s3://`, `s3a://`, ...) are rejected; this
    /// backend only understands filesystem paths.
    pub fn new(input_base: impl Into<PathBuf>, output_base: impl Into<PathBuf>) -> EtlResult<Self> {
        let input_base = input_base.into();
        let output_base = output_base.into();
        for base in [&input_base, &output_base] {
            if has_url_scheme(base) {
                return Err(sparkify_common::Error::Config(format!(
                    "{} is a remote URL; local storage needs a filesystem path",
                    base.display()
                ))
                .into());
            }
        }
        Ok(Self {
            input_base,
            output_base,
            compression: OutputCompression::default(),
            credentials: None,
        })
    }

    pub fn with_compression(mut self, compression: OutputCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Attach credentials for this run
    ///
    /// Filesystem access does not authenticate, so they are only retained
    /// for the lifetime of the storage value.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        if credentials.is_some() {
            debug!("Local storage ignores configured credentials");
        }
        self.credentials = credentials;
        self
    }

    pub fn input_base(&self) -> &Path {
        &self.input_base
    }

    pub fn output_base(&self) -> &Path {
        &self.output_base
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn list_json_files(&self, root: &Path) -> Vec<PathBuf> {
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(should_process_entry);

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_json_file(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    // Continue listing, an unreadable entry is not a missing source
                    warn!("Error accessing entry: {}", e);
                }
            }
        }
        files
    }
}

impl TableStorage for LocalStorage {
    fn read_records(&self, dataset_path: &str) -> EtlResult<Vec<SourceRecord>> {
        let root = self.input_base.join(dataset_path);
        let pattern = format!("{}/**/*.json", root.display());

        if !root.exists() {
            return Err(EtlError::SourceNotFound { pattern });
        }

        let files = self.list_json_files(&root);
        if files.is_empty() {
            return Err(EtlError::SourceNotFound { pattern });
        }
        debug!("Found {} JSON files under {}", files.len(), root.display());

        let mut records = Vec::new();
        for path in files {
            read_json_file(&path, &mut records)?;
        }

        info!(
            "Read {} records from {}",
            records.len(),
            root.display()
        );
        Ok(records)
    }

    fn write_table(&self, table: &TableOutput) -> EtlResult<WriteSummary> {
        let table_dir = self.output_base.join(&table.name);

        // Overwrite semantics: the previous table is removed entirely
        if table_dir.exists() {
            fs::remove_dir_all(&table_dir).map_err(|e| EtlError::write(&table.name, e))?;
        }
        fs::create_dir_all(&table_dir).map_err(|e| EtlError::write(&table.name, e))?;

        let slices = split_partitions(&table.batch, &table.partition_by)?;
        let mut files = 0;
        for slice in &slices {
            let dir = slice
                .segments
                .iter()
                .fold(table_dir.clone(), |dir, segment| dir.join(segment));
            fs::create_dir_all(&dir).map_err(|e| EtlError::write(&table.name, e))?;

            let file = File::create(dir.join(PART_FILE_NAME))
                .map_err(|e| EtlError::write(&table.name, e))?;
            write_parquet(file, &slice.batch, self.compression)
                .map_err(|e| EtlError::write(&table.name, e))?;
            files += 1;
        }

        File::create(table_dir.join(SUCCESS_MARKER)).map_err(|e| EtlError::write(&table.name, e))?;

        debug!(
            "Wrote {} partition files to {}",
            files,
            table_dir.display()
        );
        Ok(WriteSummary {
            table: table.name.clone(),
            rows: table.num_rows(),
            files,
        })
    }
}

fn read_json_file(path: &Path, records: &mut Vec<SourceRecord>) -> EtlResult<()> {
    let file = File::open(path)?;
    let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<Value>();

    let mut index = 0;
    for item in stream {
        let value = item.map_err(|e| EtlError::Parse {
            path: path.to_path_buf(),
            record: index,
            message: e.to_string(),
        })?;
        match value {
            Value::Array(values) => {
                for value in values {
                    records.push(SourceRecord {
                        path: path.to_path_buf(),
                        index,
                        value,
                    });
                    index += 1;
                }
            }
            value => {
                records.push(SourceRecord {
                    path: path.to_path_buf(),
                    index,
                    value,
                });
                index += 1;
            }
        }
    }
    Ok(())
}

fn should_process_entry(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !(name.starts_with('.') || name.starts_with('_'))
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn has_url_scheme(path: &Path) -> bool {
    path.to_string_lossy().contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> LocalStorage {
        LocalStorage::new(dir.path().join("in"), dir.path().join("out")).unwrap()
    }

    #[test]
    fn test_rejects_remote_urls() {
        let result = LocalStorage::new("s3a://udacity-dend/", "./out");
        assert!(matches!(result, Err(EtlError::Common(_))));
    }

    #[test]
    fn test_missing_dataset_is_source_not_found() {
        let dir = TempDir::new().unwrap();
        let result = storage(&dir).read_records("song_data");
        assert!(matches!(result, Err(EtlError::SourceNotFound { .. })));
    }

    #[test]
    fn test_dataset_without_json_is_source_not_found() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("in/song_data/A");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("notes.txt"), "hello").unwrap();

        let result = storage(&dir).read_records("song_data");
        assert!(matches!(result, Err(EtlError::SourceNotFound { .. })));
    }

    #[test]
    fn test_reads_nested_files_in_path_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("in/log_data/2018/11");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("b.json"), "{\"n\": 3}").unwrap();
        fs::write(root.join("a.json"), "{\"n\": 1}\n{\"n\": 2}\n").unwrap();
        fs::write(root.join(".hidden.json"), "{\"n\": 99}").unwrap();

        let records = storage(&dir).read_records("log_data").unwrap();
        let values: Vec<i64> = records.iter().map(|r| r.value["n"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(records[1].index, 1);
    }

    #[test]
    fn test_top_level_array_is_flattened() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("in/song_data");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("s.json"), "[{\"n\": 1}, {\"n\": 2}]").unwrap();

        let records = storage(&dir).read_records("song_data").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("in/song_data");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("bad.json"), "{\"n\": 1}\n{\"n\": ").unwrap();

        let result = storage(&dir).read_records("song_data");
        match result {
            Err(EtlError::Parse { path, record, .. }) => {
                assert!(path.ends_with("bad.json"));
                assert_eq!(record, 1);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
