//! Hive-style partition splitting
//!
//! A batch is split into one slice per distinct combination of partition
//! column values. Partition columns are removed from the slice payload and
//! encoded in the directory path instead (`year=2018/month=11`).

use crate::error::EtlResult;
use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use std::collections::BTreeMap;

/// Directory value used for null partition keys
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Rows of one partition
#[derive(Debug, Clone)]
pub struct PartitionSlice {
    /// Directory segments such as `year=2018`, outermost first
    pub segments: Vec<String>,
    /// Rows of this partition without the partition columns
    pub batch: RecordBatch,
}

/// Split `batch` by the values of `partition_by`
///
/// Slices come out ordered by their directory segments; rows keep their
/// original relative order inside a slice. An unpartitioned table yields a
/// single slice holding the whole batch, a partitioned empty table yields none.
pub fn split_partitions(
    batch: &RecordBatch,
    partition_by: &[String],
) -> EtlResult<Vec<PartitionSlice>> {
    if partition_by.is_empty() {
        return Ok(vec![PartitionSlice {
            segments: Vec::new(),
            batch: batch.clone(),
        }]);
    }

    let schema = batch.schema();
    let mut key_columns = Vec::with_capacity(partition_by.len());
    for name in partition_by {
        key_columns.push(schema.index_of(name)?);
    }
    let data_columns: Vec<usize> = (0..schema.fields().len())
        .filter(|i| !key_columns.contains(i))
        .collect();
    let payload = batch.project(&data_columns)?;

    let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let mut segments = Vec::with_capacity(key_columns.len());
        for (name, &col) in partition_by.iter().zip(&key_columns) {
            let value = partition_value(batch.column(col), row)?;
            segments.push(format!("{}={}", escape_path_name(name), value));
        }
        groups.entry(segments).or_default().push(row as u32);
    }

    let mut slices = Vec::with_capacity(groups.len());
    for (segments, rows) in groups {
        let indices = UInt32Array::from(rows);
        let columns = payload
            .columns()
            .iter()
            .map(|c| take(c.as_ref(), &indices, None))
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        slices.push(PartitionSlice {
            segments,
            batch: RecordBatch::try_new(payload.schema(), columns)?,
        });
    }
    Ok(slices)
}

fn partition_value(column: &ArrayRef, row: usize) -> EtlResult<String> {
    if column.is_null(row) {
        return Ok(DEFAULT_PARTITION.to_string());
    }
    let rendered = array_value_to_string(column, row)?;
    if rendered.is_empty() {
        return Ok(DEFAULT_PARTITION.to_string());
    }
    Ok(escape_path_name(&rendered))
}

/// Percent-escape characters that cannot appear in a partition directory name
pub fn escape_path_name(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", byte));
            }
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn needs_escape(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, true),
            Field::new("year", DataType::Int32, true),
            Field::new("month", DataType::Int32, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), Some("c"), Some("d")])),
                Arc::new(Int32Array::from(vec![Some(2018), Some(2018), None, Some(2018)])),
                Arc::new(Int32Array::from(vec![Some(11), Some(12), Some(1), Some(11)])),
            ],
        )
        .unwrap()
    }

    fn ids(batch: &RecordBatch) -> Vec<String> {
        let col = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        (0..col.len()).map(|i| col.value(i).to_string()).collect()
    }

    #[test]
    fn test_unpartitioned_is_single_slice() {
        let batch = sample_batch();
        let slices = split_partitions(&batch, &[]).unwrap();
        assert_eq!(slices.len(), 1);
        assert!(slices[0].segments.is_empty());
        assert_eq!(slices[0].batch.num_columns(), 3);
        assert_eq!(slices[0].batch.num_rows(), 4);
    }

    #[test]
    fn test_split_by_two_columns() {
        let batch = sample_batch();
        let slices =
            split_partitions(&batch, &["year".to_string(), "month".to_string()]).unwrap();

        let segments: Vec<Vec<String>> = slices.iter().map(|s| s.segments.clone()).collect();
        assert_eq!(
            segments,
            vec![
                vec!["year=2018".to_string(), "month=11".to_string()],
                vec!["year=2018".to_string(), "month=12".to_string()],
                vec![format!("year={}", DEFAULT_PARTITION), "month=1".to_string()],
            ]
        );

        // Partition columns are dropped, row order is kept
        assert_eq!(slices[0].batch.num_columns(), 1);
        assert_eq!(ids(&slices[0].batch), vec!["a", "d"]);
        assert_eq!(ids(&slices[1].batch), vec!["b"]);
        assert_eq!(ids(&slices[2].batch), vec!["c"]);
    }

    #[test]
    fn test_unknown_partition_column_fails() {
        let batch = sample_batch();
        assert!(split_partitions(&batch, &["nope".to_string()]).is_err());
    }

    #[test]
    fn test_empty_partitioned_batch_has_no_slices() {
        let batch = sample_batch().slice(0, 0);
        let slices = split_partitions(&batch, &["year".to_string()]).unwrap();
        assert!(slices.is_empty());
    }

    #[test]
    fn test_escape_path_name() {
        assert_eq!(escape_path_name("ARJIE2Y1187B994AB7"), "ARJIE2Y1187B994AB7");
        assert_eq!(escape_path_name("a/b=c"), "a%2Fb%3Dc");
        assert_eq!(escape_path_name("50%"), "50%25");
        assert_eq!(escape_path_name("café"), "café");
    }
}
