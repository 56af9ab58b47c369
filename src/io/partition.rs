//! Unit-partitioned Parquet staging area.
//!
//! Each unit writes exactly one file under its own partition directory:
//!
//! ```text
//! <staging>/<key>=<unit_id>/part-0.parquet
//! ```
//!
//! Units never share a directory, so concurrent writers cannot collide.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::domain::{OutputRecord, TrendStats, UnitId};
use crate::error::{AppError, UnitError};

const PART_FILE: &str = "part-0.parquet";

#[derive(Debug, Clone)]
pub struct PartitionedSink {
    root: PathBuf,
    key: String,
}

impl PartitionedSink {
    /// Prepare an empty staging directory, discarding leftovers of an earlier run.
    pub fn create(root: impl Into<PathBuf>, key: impl Into<String>) -> Result<Self, AppError> {
        let root = root.into();
        let key = key.into();
        if is_reserved_column(&key) {
            return Err(AppError::config(format!(
                "Id field '{key}' clashes with an output column; rename it in the store or pick another id field."
            )));
        }
        if root.exists() {
            log::warn!("Removing stale staging area {}", root.display());
            fs::remove_dir_all(&root).map_err(|e| {
                AppError::output(format!("Failed to clear staging area '{}': {e}", root.display()))
            })?;
        }
        fs::create_dir_all(&root).map_err(|e| {
            AppError::output(format!("Failed to create staging area '{}': {e}", root.display()))
        })?;
        Ok(Self { root, key })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn partition_dir(&self, unit: &UnitId) -> PathBuf {
        partition_dir(&self.root, &self.key, unit)
    }

    /// Persist one record into its unit's partition.
    pub fn write(&self, record: &OutputRecord) -> Result<PathBuf, UnitError> {
        let dir = self.partition_dir(&record.unit_id);
        fs::create_dir_all(&dir)
            .map_err(|e| UnitError::Output(format!("create '{}': {e}", dir.display())))?;

        let batch = record_batch(record, &self.key).map_err(|e| UnitError::Output(e.to_string()))?;
        let path = dir.join(PART_FILE);
        write_parquet(&path, &batch).map_err(UnitError::Output)?;
        Ok(path)
    }
}

/// Column names every record already uses: `type`, the statistics and the
/// `d_YYYY-MM-DD` series columns.
pub fn is_reserved_column(name: &str) -> bool {
    name == "type"
        || TrendStats::COLUMNS.iter().any(|c| *c == name)
        || name
            .strip_prefix("d_")
            .is_some_and(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok())
}

pub fn partition_dir(root: &Path, key: &str, unit: &UnitId) -> PathBuf {
    root.join(format!("{key}={}", escape_partition_value(&unit.to_string())))
}

/// Percent-encode anything that is not safe in a directory name.
fn escape_partition_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Single-row batch: `<key>, type, <stats...>, d_<date>...`.
pub fn record_batch(record: &OutputRecord, key: &str) -> Result<RecordBatch, ArrowError> {
    let mut fields: Vec<Field> = Vec::with_capacity(2 + TrendStats::COLUMNS.len() + record.series.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    match &record.unit_id {
        UnitId::Int(v) => {
            fields.push(Field::new(key, DataType::Int64, false));
            columns.push(Arc::new(Int64Array::from(vec![*v])));
        }
        UnitId::Text(s) => {
            fields.push(Field::new(key, DataType::Utf8, false));
            columns.push(Arc::new(StringArray::from(vec![s.as_str()])));
        }
    }

    fields.push(Field::new("type", DataType::Int32, false));
    columns.push(Arc::new(Int32Array::from(vec![record.record_type])));

    for (name, value) in TrendStats::COLUMNS.iter().zip(record.stats.values()) {
        fields.push(Field::new(*name, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(vec![value])));
    }

    for (name, value) in record.series_columns().into_iter().zip(&record.series.values) {
        fields.push(Field::new(name, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(vec![*value])));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
}

pub(crate) fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("create '{}': {e}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| format!("open writer '{}': {e}", path.display()))?;
    writer
        .write(batch)
        .map_err(|e| format!("write '{}': {e}", path.display()))?;
    writer
        .close()
        .map_err(|e| format!("finish '{}': {e}", path.display()))?;
    Ok(())
}
