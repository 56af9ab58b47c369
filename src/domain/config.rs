//! Run configuration.
//!
//! The CLI (and `.env`) resolve into a [`BatchConfig`]; everything below the
//! orchestrator only sees the parts it needs.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::BinFilter;
use crate::error::AppError;

/// Warm-up bins dropped after gap-filling (convolution edge artifacts).
pub const DEFAULT_WARMUP_BINS: usize = 10;

/// Analysis window and bin layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start: NaiveDate,
    /// Exclusive end of the window.
    pub end: NaiveDate,
    pub bin_width_days: u32,
    /// Absorb Feb 29 into the bin containing it so bins keep their calendar position.
    pub skip_leap_day: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(1997, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2008, 1, 1).unwrap_or_default(),
            bin_width_days: 5,
            skip_leap_day: true,
        }
    }
}

/// How observations are admitted into a bin and how bins are labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningConfig {
    pub filter: BinFilter,
    /// Minimum sample quality, in percent.
    pub min_quality: f64,
    /// Value threshold used by [`BinFilter::QualityOrValue`].
    pub value_floor: f64,
    /// Label date is `bin end - label_offset_days`.
    pub label_offset_days: i64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            filter: BinFilter::Quality,
            min_quality: 70.0,
            value_floor: 0.0,
            label_offset_days: 2,
        }
    }
}

/// Seasonal-convolution gap-filling attenuations, in dB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFillConfig {
    /// Attenuation between opposite seasonal phases.
    pub att_seas_db: f64,
    /// Attenuation across the full length of the series.
    pub att_env_db: f64,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            att_seas_db: 60.0,
            att_env_db: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionConfig {
    /// Seasonal smoother length; `None` means `season_size + 2`.
    pub seasonal_smooth: Option<usize>,
    pub robust: bool,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            seasonal_smooth: None,
            robust: true,
        }
    }
}

/// Everything the per-unit pipeline needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub window: WindowConfig,
    pub binning: BinningConfig,
    pub gapfill: GapFillConfig,
    pub decomposition: DecompositionConfig,
    pub warmup_bins: usize,
    /// Decimal places kept in the output; `None` disables rounding.
    pub round_decimals: Option<u32>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            binning: BinningConfig::default(),
            gapfill: GapFillConfig::default(),
            decomposition: DecompositionConfig::default(),
            warmup_bins: DEFAULT_WARMUP_BINS,
            round_decimals: Some(8),
        }
    }
}

impl TrendConfig {
    /// Checks that don't need the grid. Grid-dependent checks happen when the
    /// pipeline context is built.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.binning.min_quality.is_finite() {
            return Err(AppError::config("Minimum quality must be finite."));
        }
        if !self.binning.value_floor.is_finite() {
            return Err(AppError::config("Value floor must be finite."));
        }
        if self.binning.label_offset_days < 0 {
            return Err(AppError::config("Label offset must be >= 0 days."));
        }
        let g = &self.gapfill;
        if !(g.att_seas_db.is_finite() && g.att_env_db.is_finite() && g.att_seas_db >= 0.0 && g.att_env_db >= 0.0) {
            return Err(AppError::config("Gap-fill attenuations must be finite and >= 0 dB."));
        }
        if let Some(ns) = self.decomposition.seasonal_smooth {
            if ns < 3 || ns % 2 == 0 {
                return Err(AppError::config(format!(
                    "Seasonal smoother must be odd and >= 3 (got {ns})."
                )));
            }
        }
        Ok(())
    }
}

/// Table and column names of the observation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSchema {
    pub table: String,
    pub id_field: String,
    pub date_column: String,
    pub value_column: String,
    pub count_column: String,
    pub total_column: String,
}

impl StoreSchema {
    pub fn with_id_field(id_field: impl Into<String>) -> Self {
        Self {
            table: "restoration".to_string(),
            id_field: id_field.into(),
            date_column: "date".to_string(),
            value_column: "NDVI_median".to_string(),
            count_column: "Pixel_Count".to_string(),
            total_column: "Total_Pixels".to_string(),
        }
    }
}

/// A whole batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub db_path: PathBuf,
    pub schema: StoreSchema,
    /// Base name of every artifact the run produces.
    pub output_name: String,
    /// Directory the artifacts are written to.
    pub output_dir: PathBuf,
    /// Worker threads; `0` lets the pool pick one per core.
    pub workers: usize,
    pub sequential: bool,
    pub trend: TrendConfig,
}

impl BatchConfig {
    /// Partitioned staging area, removed after consolidation.
    pub fn staging_dir(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_trend_analysis.pq", self.output_name))
    }

    /// Consolidated artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_trend_analysis.parquet", self.output_name))
    }

    pub fn failures_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_trend_failures.csv", self.output_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        TrendConfig::default().validate().unwrap();
    }

    #[test]
    fn even_seasonal_smoother_is_rejected() {
        let mut cfg = TrendConfig::default();
        cfg.decomposition.seasonal_smooth = Some(24);
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn artifact_paths_derive_from_output_name() {
        let cfg = BatchConfig {
            db_path: PathBuf::from("samples.db"),
            schema: StoreSchema::with_id_field("ID_POL"),
            output_name: "goias".to_string(),
            output_dir: PathBuf::from("out"),
            workers: 2,
            sequential: false,
            trend: TrendConfig::default(),
        };
        assert_eq!(cfg.staging_dir(), PathBuf::from("out/goias_trend_analysis.pq"));
        assert_eq!(cfg.artifact_path(), PathBuf::from("out/goias_trend_analysis.parquet"));
        assert_eq!(cfg.failures_path(), PathBuf::from("out/goias_trend_failures.csv"));
    }
}
