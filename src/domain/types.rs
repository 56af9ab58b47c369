//! Shared domain types.
//!
//! Everything a unit carries through the pipeline lives here:
//!
//! - raw observations as read from the store (`Observation`)
//! - the regularized series (`BinnedSeries`, `FilledSeries`)
//! - the per-unit result (`TrendStats`, `OutputRecord`)

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::UnitError;

/// Identifier of a spatial unit.
///
/// Stores key units by integer or by text; we keep whichever type the store
/// hands back so queries bind the identifier with its native type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitId {
    Int(i64),
    Text(String),
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Int(v) => write!(f, "{v}"),
            UnitId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl Ord for UnitId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Same order SQLite uses for mixed columns: integers sort before text.
        match (self, other) {
            (UnitId::Int(a), UnitId::Int(b)) => a.cmp(b),
            (UnitId::Text(a), UnitId::Text(b)) => a.cmp(b),
            (UnitId::Int(_), UnitId::Text(_)) => Ordering::Less,
            (UnitId::Text(_), UnitId::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for UnitId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i64> for UnitId {
    fn from(value: i64) -> Self {
        UnitId::Int(value)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        UnitId::Text(value.to_string())
    }
}

/// One raw, date-stamped summary measurement for a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub unit_id: UnitId,
    /// `None` when the stored date could not be parsed.
    pub date: Option<NaiveDate>,
    pub value: Option<f64>,
    pub sample_count: Option<f64>,
    pub sample_total: Option<f64>,
}

impl Observation {
    /// Share of usable samples, in percent.
    ///
    /// `None` when the total is missing, zero, or either operand is non-finite.
    pub fn quality(&self) -> Option<f64> {
        let count = self.sample_count?;
        let total = self.sample_total?;
        if !(count.is_finite() && total.is_finite()) || total == 0.0 {
            return None;
        }
        Some(count / total * 100.0)
    }
}

/// Enumeration row: one distinct unit and the extent of its observations.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSummary {
    pub unit_id: UnitId,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub count: u64,
}

/// One fixed interval of the analysis grid. `start..=end`, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalBin {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: NaiveDate,
}

impl TemporalBin {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Admissibility rule applied to observations before they are averaged into a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BinFilter {
    /// Keep observations whose sample quality reaches the threshold.
    Quality,
    /// Keep observations that reach the quality threshold OR whose value
    /// exceeds the value floor.
    QualityOrValue,
}

/// One value per grid bin for a single unit; `None` marks a missing bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedSeries {
    pub labels: Vec<NaiveDate>,
    pub values: Vec<Option<f64>>,
}

impl BinnedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(|v| v.is_none())
    }
}

/// Gap-filled series with the warm-up bins already dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledSeries {
    pub labels: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl FilledSeries {
    /// Build the trimmed series from the binned labels and the gap-filler output.
    ///
    /// Fails when the input carried no value at all, when the filler left
    /// gaps behind, or when nothing survives the warm-up trim.
    pub fn from_filled(
        binned: &BinnedSeries,
        filled: Vec<Option<f64>>,
        warmup: usize,
    ) -> Result<Self, UnitError> {
        debug_assert_eq!(binned.len(), filled.len());
        if binned.is_all_missing() {
            return Err(UnitError::AllMissing);
        }

        let missing = filled.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            return Err(UnitError::Unfillable { missing });
        }

        if filled.len() <= warmup {
            return Err(UnitError::SeriesTooShort {
                len: filled.len(),
                required: warmup + 1,
            });
        }

        let values: Vec<f64> = filled.into_iter().skip(warmup).flatten().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(UnitError::NonFinite("gap-filled series"));
        }

        Ok(Self {
            labels: binned.labels[warmup..].to_vec(),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Linear trend statistics for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub intercept_m: f64,
    pub intercept_sd: f64,
    pub intercept_tv: f64,
    pub intercept_pv: f64,
    pub trend_m: f64,
    pub trend_sd: f64,
    pub trend_tv: f64,
    pub trend_pv: f64,
    pub r2: f64,
    /// Last trend value minus first trend value.
    pub diff_trend: f64,
}

impl TrendStats {
    /// Output column names, in record order.
    pub const COLUMNS: [&'static str; 10] = [
        "intercept_m",
        "intercept_sd",
        "intercept_tv",
        "intercept_pv",
        "trend_m",
        "trend_sd",
        "trend_tv",
        "trend_pv",
        "r2",
        "diff_trend",
    ];

    pub fn values(&self) -> [f64; 10] {
        [
            self.intercept_m,
            self.intercept_sd,
            self.intercept_tv,
            self.intercept_pv,
            self.trend_m,
            self.trend_sd,
            self.trend_tv,
            self.trend_pv,
            self.r2,
            self.diff_trend,
        ]
    }
}

/// Value of the `type` column for trend records.
pub const RECORD_TYPE_TREND: i32 = 1;

/// One output row: identifier, statistics and the trimmed filled series.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub unit_id: UnitId,
    pub record_type: i32,
    pub stats: TrendStats,
    pub series: FilledSeries,
}

impl OutputRecord {
    /// Round every floating value to `decimals` places. Non-finite values pass through.
    pub fn rounded(mut self, decimals: u32) -> Self {
        let r = |v: f64| round_to(v, decimals);
        let s = &mut self.stats;
        s.intercept_m = r(s.intercept_m);
        s.intercept_sd = r(s.intercept_sd);
        s.intercept_tv = r(s.intercept_tv);
        s.intercept_pv = r(s.intercept_pv);
        s.trend_m = r(s.trend_m);
        s.trend_sd = r(s.trend_sd);
        s.trend_tv = r(s.trend_tv);
        s.trend_pv = r(s.trend_pv);
        s.r2 = r(s.r2);
        s.diff_trend = r(s.diff_trend);
        for v in &mut self.series.values {
            *v = r(*v);
        }
        self
    }

    /// Column name of each series value: `d_YYYY-MM-DD`.
    pub fn series_columns(&self) -> Vec<String> {
        self.series
            .labels
            .iter()
            .map(|d| format!("d_{}", d.format("%Y-%m-%d")))
            .collect()
    }
}

/// A unit whose pipeline failed, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub unit_id: UnitId,
    pub error: UnitError,
}

fn round_to(v: f64, decimals: u32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let scale = 10f64.powi(decimals as i32);
    let scaled = v * scale;
    // Values too large to carry the requested precision are left alone.
    if !scaled.is_finite() {
        return v;
    }
    scaled.round() / scale
}
