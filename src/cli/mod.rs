//! Command-line parsing for the `trend` binary.
//!
//! Parsing stays separate from the run itself; [`crate::app`] turns a parsed
//! [`Cli`] into a [`crate::domain::BatchConfig`]. Flags marked with an env
//! name also read it, so a `.env` file next to the working directory can hold
//! site defaults.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::domain::BinFilter;

/// Top-level CLI.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "trend",
    version,
    about = "Per-unit vegetation trend analysis over a SQLite observation store"
)]
pub struct Cli {
    /// SQLite database holding the observations.
    #[arg(long, env = "TREND_DB", value_name = "PATH")]
    pub db: PathBuf,

    /// Column identifying a unit (e.g. ID_POL).
    #[arg(long)]
    pub id_field: String,

    /// Base name of the produced artifacts.
    #[arg(short = 'o', long)]
    pub output_name: String,

    /// Directory the artifacts are written to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Observation table.
    #[arg(long, default_value = "restoration")]
    pub table: String,

    #[arg(long, default_value = "date")]
    pub date_column: String,

    #[arg(long, default_value = "NDVI_median")]
    pub value_column: String,

    /// Usable sample count per observation.
    #[arg(long, default_value = "Pixel_Count")]
    pub count_column: String,

    /// Total sample count per observation.
    #[arg(long, default_value = "Total_Pixels")]
    pub total_column: String,

    /// First day of the analysis window (YYYY-MM-DD).
    #[arg(long, default_value = "1997-01-01")]
    pub start: NaiveDate,

    /// Day after the analysis window (exclusive, YYYY-MM-DD).
    #[arg(long, default_value = "2008-01-01")]
    pub end: NaiveDate,

    /// Bin width in days; must divide 365.
    #[arg(long, default_value_t = 5)]
    pub bin_width: u32,

    /// Keep Feb 29 as a regular day instead of absorbing it into its bin.
    #[arg(long)]
    pub keep_leap_day: bool,

    /// Observation admissibility rule.
    #[arg(long, value_enum, default_value_t = BinFilter::Quality)]
    pub filter: BinFilter,

    /// Minimum usable share of samples, in percent.
    #[arg(long, default_value_t = 70.0)]
    pub min_quality: f64,

    /// Values above this floor pass the `quality-or-value` filter.
    #[arg(long, default_value_t = 0.0)]
    pub value_floor: f64,

    /// Days between a bin's last day and its label.
    #[arg(long, default_value_t = 2)]
    pub label_offset: i64,

    /// Bins dropped from the start of the gap-filled series.
    #[arg(long, default_value_t = crate::domain::DEFAULT_WARMUP_BINS)]
    pub warmup: usize,

    /// Seasonal smoother length (odd, >= 3). Defaults to season size + 2.
    #[arg(long)]
    pub seasonal_smooth: Option<usize>,

    /// Disable robustness iterations in the decomposition.
    #[arg(long)]
    pub no_robust: bool,

    /// Worker threads (0 = one per core).
    #[arg(short = 'j', long, env = "TREND_WORKERS", default_value_t = 0)]
    pub workers: usize,

    /// Run every unit on the main thread.
    #[arg(long)]
    pub sequential: bool,

    /// Directory for rotated log files.
    #[arg(long, env = "TREND_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Log level spec, e.g. `info` or `info,unit_trends::store=debug`.
    #[arg(long, env = "TREND_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
