//! Run summary formatting.
//!
//! Kept apart from the orchestrator so output changes stay local.

use crate::domain::{BatchConfig, UnitFailure};
use crate::orchestrator::RunSummary;

/// Failures listed in the terminal summary; the CSV report holds all of them.
const MAX_FAILURES_SHOWN: usize = 20;

pub fn format_run_summary(summary: &RunSummary, config: &BatchConfig) -> String {
    let mut out = String::new();
    let trend = &config.trend;

    out.push_str("=== trend - per-unit trend analysis ===\n");
    out.push_str(&format!(
        "Store: {} (table={}, id={})\n",
        config.db_path.display(),
        config.schema.table,
        config.schema.id_field
    ));
    out.push_str(&format!(
        "Window: {} .. {} | bins of {} days | filter={:?} min_quality={}\n",
        trend.window.start,
        trend.window.end,
        trend.window.bin_width_days,
        trend.binning.filter,
        trend.binning.min_quality
    ));
    out.push_str(&format!(
        "Units: {} total | {} succeeded | {} failed | {:.1}s\n",
        summary.units_total,
        summary.succeeded.len(),
        summary.failures.len(),
        summary.elapsed.as_secs_f64()
    ));

    match &summary.artifact {
        Some(path) => out.push_str(&format!("Artifact: {}\n", path.display())),
        None => out.push_str("Artifact: none (no unit succeeded)\n"),
    }
    if let Some(path) = &summary.failure_report {
        out.push_str(&format!("Failure report: {}\n", path.display()));
    }

    if !summary.failures.is_empty() {
        out.push('\n');
        out.push_str(&format_failures(&summary.failures));
    }

    out
}

pub fn format_failures(failures: &[UnitFailure]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<16} {:<20} {}\n", "unit", "kind", "error"));
    out.push_str(&format!("{:-<16} {:-<20} {:-<5}\n", "", "", ""));

    for f in failures.iter().take(MAX_FAILURES_SHOWN) {
        out.push_str(
            format!(
                "{:<16} {:<20} {}",
                truncate(&f.unit_id.to_string(), 16),
                f.error.kind(),
                f.error
            )
            .trim_end(),
        );
        out.push('\n');
    }
    if failures.len() > MAX_FAILURES_SHOWN {
        out.push_str(&format!("... and {} more\n", failures.len() - MAX_FAILURES_SHOWN));
    }

    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StoreSchema, TrendConfig, UnitId};
    use crate::error::UnitError;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> BatchConfig {
        BatchConfig {
            db_path: PathBuf::from("restoration.db"),
            schema: StoreSchema::with_id_field("ID_POL"),
            output_name: "site".to_string(),
            output_dir: PathBuf::from("."),
            workers: 0,
            sequential: false,
            trend: TrendConfig::default(),
        }
    }

    #[test]
    fn summary_lists_counts_artifact_and_failures() {
        let summary = RunSummary {
            units_total: 3,
            succeeded: vec![UnitId::Int(1), UnitId::Int(2)],
            failures: vec![UnitFailure {
                unit_id: UnitId::Int(3),
                error: UnitError::AllMissing,
            }],
            artifact: Some(PathBuf::from("site_trend_analysis.parquet")),
            failure_report: Some(PathBuf::from("site_trend_failures.csv")),
            elapsed: Duration::from_millis(1500),
        };

        let text = format_run_summary(&summary, &config());
        assert!(text.contains("Units: 3 total | 2 succeeded | 1 failed | 1.5s"));
        assert!(text.contains("Artifact: site_trend_analysis.parquet"));
        assert!(text.contains("Failure report: site_trend_failures.csv"));
        assert!(text.contains("3                all_missing          no admissible observation in any bin"));
    }

    #[test]
    fn long_failure_lists_are_capped() {
        let failures: Vec<UnitFailure> = (0..25)
            .map(|i| UnitFailure {
                unit_id: UnitId::Int(i),
                error: UnitError::SingularRegression,
            })
            .collect();
        let text = format_failures(&failures);
        assert_eq!(text.lines().count(), 2 + MAX_FAILURES_SHOWN + 1);
        assert!(text.ends_with("... and 5 more\n"));
    }

    #[test]
    fn truncate_marks_cut_ids() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
