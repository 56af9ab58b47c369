//! Failure report: one CSV row per unit that produced no output.

use std::path::Path;

use serde::Serialize;

use crate::domain::UnitFailure;
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct FailureRow<'a> {
    unit_id: String,
    kind: &'a str,
    error: String,
}

/// Write `unit_id,kind,error` rows for every failure, in the given order.
pub fn write_failures_csv(path: &Path, failures: &[UnitFailure]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::output(format!("Failed to create failure report '{}': {e}", path.display()))
    })?;

    for f in failures {
        writer
            .serialize(FailureRow {
                unit_id: f.unit_id.to_string(),
                kind: f.error.kind(),
                error: f.error.to_string(),
            })
            .map_err(|e| AppError::output(format!("Failed to write failure report row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::output(format!("Failed to flush failure report: {e}")))?;
    Ok(())
}
