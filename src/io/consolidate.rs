//! Merge unit partitions into the single output artifact.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::domain::UnitId;
use crate::error::AppError;
use crate::io::partition::{partition_dir, write_parquet};

/// Read every batch of a Parquet file.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::output(format!("Failed to open '{}': {e}", path.display())))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|b| b.build())
        .map_err(|e| AppError::output(format!("Failed to read '{}': {e}", path.display())))?;
    reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::output(format!("Failed to decode '{}': {e}", path.display())))
}

/// Concatenate the partitions of `units` (in that order) into `artifact`, then
/// remove the staging area.
///
/// On any error the staging area is left untouched so the run can be inspected
/// or consolidated again. Returns the number of rows written.
pub fn consolidate(
    staging: &Path,
    key: &str,
    units: &[UnitId],
    artifact: &Path,
) -> Result<usize, AppError> {
    if units.is_empty() {
        return Err(AppError::output("No unit partition to consolidate."));
    }

    let mut batches: Vec<RecordBatch> = Vec::with_capacity(units.len());
    let mut schema: Option<Arc<Schema>> = None;

    for unit in units {
        let dir = partition_dir(staging, key, unit);
        let mut parts: Vec<_> = fs::read_dir(&dir)
            .map_err(|e| {
                AppError::output(format!("Missing partition for unit {unit} ('{}'): {e}", dir.display()))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        parts.sort();
        if parts.is_empty() {
            return Err(AppError::output(format!("Partition for unit {unit} is empty.")));
        }

        for part in parts {
            for batch in read_parquet(&part)? {
                let expected = schema.get_or_insert_with(|| {
                    Arc::new(Schema::new(batch.schema().fields().clone()))
                });
                if batch.schema().fields() != expected.fields() {
                    return Err(AppError::output(format!(
                        "Partition '{}' does not match the schema of earlier units.",
                        part.display()
                    )));
                }
                let batch = RecordBatch::try_new(expected.clone(), batch.columns().to_vec())
                    .map_err(|e| AppError::output(format!("Failed to align '{}': {e}", part.display())))?;
                batches.push(batch);
            }
        }
    }

    let Some(schema) = schema else {
        return Err(AppError::output("Partitions contained no record batch."));
    };
    let merged = concat_batches(&schema, &batches)
        .map_err(|e| AppError::output(format!("Failed to concatenate partitions: {e}")))?;

    if let Some(parent) = artifact.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::output(format!("Failed to create '{}': {e}", parent.display())))?;
    }
    write_parquet(artifact, &merged).map_err(AppError::output)?;

    fs::remove_dir_all(staging).map_err(|e| {
        AppError::output(format!("Failed to remove staging area '{}': {e}", staging.display()))
    })?;

    log::info!("Consolidated {} rows into {}", merged.num_rows(), artifact.display());
    Ok(merged.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FilledSeries, OutputRecord, RECORD_TYPE_TREND, TrendStats};
    use crate::io::PartitionedSink;
    use arrow::array::{Array, Int64Array};
    use chrono::NaiveDate;

    fn record(id: i64, slope: f64) -> OutputRecord {
        let stats = TrendStats {
            intercept_m: 1.0,
            intercept_sd: 0.1,
            intercept_tv: 10.0,
            intercept_pv: 0.0,
            trend_m: slope,
            trend_sd: 0.01,
            trend_tv: slope / 0.01,
            trend_pv: 0.5,
            r2: f64::NAN,
            diff_trend: slope * 2.0,
        };
        OutputRecord {
            unit_id: UnitId::Int(id),
            record_type: RECORD_TYPE_TREND,
            stats,
            series: FilledSeries {
                labels: vec![
                    NaiveDate::from_ymd_opt(2001, 1, 3).unwrap(),
                    NaiveDate::from_ymd_opt(2001, 1, 8).unwrap(),
                ],
                values: vec![0.2, 0.3],
            },
        }
    }

    #[test]
    fn merges_partitions_in_enumeration_order_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("out_trend_analysis.pq");
        let artifact = dir.path().join("out_trend_analysis.parquet");
        let sink = PartitionedSink::create(&staging, "ID_POL").unwrap();

        // Written out of order on purpose.
        for (id, slope) in [(3, 0.3), (1, 0.1), (2, 0.2)] {
            sink.write(&record(id, slope)).unwrap();
        }

        let units = vec![UnitId::Int(1), UnitId::Int(2), UnitId::Int(3)];
        let rows = consolidate(&staging, "ID_POL", &units, &artifact).unwrap();
        assert_eq!(rows, 3);
        assert!(!staging.exists());

        let batches = read_parquet(&artifact).unwrap();
        let merged = concat_batches(&batches[0].schema(), &batches).unwrap();
        let ids = merged
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.values().to_vec(), vec![1, 2, 3]);
        assert_eq!(merged.num_columns(), 2 + 10 + 2);
        assert_eq!(merged.schema().field(13).name(), "d_2001-01-08");
        assert!(ids.nulls().is_none());
    }

    #[test]
    fn missing_partition_keeps_staging() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("stage.pq");
        let artifact = dir.path().join("final.parquet");
        let sink = PartitionedSink::create(&staging, "ID_POL").unwrap();
        sink.write(&record(1, 0.1)).unwrap();

        let units = vec![UnitId::Int(1), UnitId::Int(2)];
        let err = consolidate(&staging, "ID_POL", &units, &artifact).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_OUTPUT);
        assert!(staging.exists());
        assert!(!artifact.exists());
    }

    #[test]
    fn nothing_to_consolidate_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = consolidate(dir.path(), "ID_POL", &[], &dir.path().join("x.parquet")).unwrap_err();
        assert!(err.to_string().contains("No unit partition"));
    }
}
