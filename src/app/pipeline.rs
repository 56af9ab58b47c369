//! Per-unit trend pipeline.
//!
//! read -> bin -> gap-fill -> trim warm-up -> decompose -> estimate -> write
//!
//! Everything shared between units lives in an immutable [`PipelineContext`]
//! built (and validated) once per run, so a unit task holds no state of its
//! own beyond its store connection.

use std::path::PathBuf;

use crate::domain::{BinningConfig, FilledSeries, OutputRecord, RECORD_TYPE_TREND, TrendConfig, UnitId};
use crate::error::{AppError, UnitError};
use crate::gapfill::{GapFiller, SeasonalConvolution};
use crate::grid::{IntervalBinner, IntervalGrid};
use crate::io::PartitionedSink;
use crate::store::{ObservationStore, StoreConnection};
use crate::trend::{TrendDecomposer, estimate_trend};

pub struct PipelineContext {
    grid: IntervalGrid,
    season_size: usize,
    binning: BinningConfig,
    filler: Box<dyn GapFiller>,
    decomposer: TrendDecomposer,
    warmup: usize,
    round_decimals: Option<u32>,
    sink: PartitionedSink,
}

impl PipelineContext {
    /// Resolve the grid and smoother settings, failing early on any
    /// configuration no unit could satisfy. The staging area is only created
    /// once the configuration is known to be usable.
    pub fn new(
        config: &TrendConfig,
        staging: impl Into<PathBuf>,
        key: &str,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let grid = IntervalGrid::new(&config.window, config.binning.label_offset_days)?;
        let season_size = grid.season_size()?;
        let decomposer = TrendDecomposer::new(season_size, &config.decomposition)?;

        let trimmed = grid.len().saturating_sub(config.warmup_bins);
        if trimmed < decomposer.min_len() {
            return Err(AppError::config(format!(
                "Window yields {trimmed} bins after dropping {} warm-up bins; the decomposition needs at least {} (two seasons of {season_size}).",
                config.warmup_bins,
                decomposer.min_len()
            )));
        }

        log::debug!(
            "Grid: {} bins of {} days, season {season_size}, {trimmed} after warm-up",
            grid.len(),
            config.window.bin_width_days
        );

        let sink = PartitionedSink::create(staging, key)?;

        Ok(Self {
            grid,
            season_size,
            binning: config.binning.clone(),
            filler: Box::new(SeasonalConvolution::new(&config.gapfill)),
            decomposer,
            warmup: config.warmup_bins,
            round_decimals: config.round_decimals,
            sink,
        })
    }

    /// Swap the gap-filling strategy.
    pub fn with_gap_filler(mut self, filler: Box<dyn GapFiller>) -> Self {
        self.filler = filler;
        self
    }

    pub fn grid(&self) -> &IntervalGrid {
        &self.grid
    }

    pub fn season_size(&self) -> usize {
        self.season_size
    }

    pub fn sink(&self) -> &PartitionedSink {
        &self.sink
    }

    /// Compute the output record of one unit without persisting it.
    pub fn analyze<S: ObservationStore>(
        &self,
        store: &S,
        unit: &UnitId,
    ) -> Result<OutputRecord, UnitError> {
        let conn = store.connect().map_err(|e| UnitError::Store(e.to_string()))?;
        let observations = conn
            .observations(unit)
            .map_err(|e| UnitError::Store(e.to_string()))?;
        log::debug!("Unit {unit}: {} observations", observations.len());

        let binned = IntervalBinner::new(&self.grid, &self.binning).bin(&observations);
        log::debug!(
            "Unit {unit}: {} of {} bins missing before gap-filling",
            binned.missing_count(),
            binned.len()
        );

        let filled = self.filler.fill(&binned.values, self.season_size);
        let series = FilledSeries::from_filled(&binned, filled, self.warmup)?;
        if series.len() < self.decomposer.min_len() {
            return Err(UnitError::SeriesTooShort {
                len: series.len(),
                required: self.decomposer.min_len(),
            });
        }

        let trend = self.decomposer.trend(&series.values)?;
        let stats = estimate_trend(&trend)?;

        let record = OutputRecord {
            unit_id: unit.clone(),
            record_type: RECORD_TYPE_TREND,
            stats,
            series,
        };
        Ok(match self.round_decimals {
            Some(d) => record.rounded(d),
            None => record,
        })
    }
}

/// Run one unit end to end and persist its record. Returns the unit id.
pub fn run_unit<S: ObservationStore>(
    ctx: &PipelineContext,
    store: &S,
    unit: &UnitId,
) -> Result<UnitId, UnitError> {
    let record = ctx.analyze(store, unit)?;
    let path = ctx.sink.write(&record)?;
    log::info!(
        "Unit {unit}: slope {:.6} (p={:.4}), written to {}",
        record.stats.trend_m,
        record.stats.trend_pv,
        path.display()
    );
    Ok(unit.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_WARMUP_BINS, Observation, WindowConfig};
    use crate::store::MemoryStore;
    use chrono::{Datelike, Duration, NaiveDate};
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    fn three_year_config() -> TrendConfig {
        TrendConfig {
            window: WindowConfig {
                start: NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2004, 1, 1).unwrap(),
                bin_width_days: 5,
                skip_leap_day: true,
            },
            ..TrendConfig::default()
        }
    }

    /// Observation every 3 days with a seasonal cycle, a linear rise and noise.
    fn greening_unit(id: i64, slope_per_year: f64, seed: u64) -> Vec<Observation> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.01).unwrap();
        let start = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        (0..365)
            .map(|k| {
                let t = 3.0 * k as f64 / 365.0;
                let season = 0.1 * (2.0 * std::f64::consts::PI * t).sin();
                Observation {
                    unit_id: UnitId::Int(id),
                    date: Some(start + Duration::days(3 * k)),
                    value: Some(0.4 + slope_per_year * t + season + noise.sample(&mut rng)),
                    sample_count: Some(95.0),
                    sample_total: Some(100.0),
                }
            })
            .collect()
    }

    fn context(dir: &std::path::Path) -> PipelineContext {
        PipelineContext::new(&three_year_config(), dir.join("t_trend_analysis.pq"), "ID_POL").unwrap()
    }

    #[test]
    fn recovers_a_positive_trend_and_writes_the_partition() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let store = MemoryStore::new(greening_unit(7, 0.05, 11));

        let id = run_unit(&ctx, &store, &UnitId::Int(7)).unwrap();
        assert_eq!(id, UnitId::Int(7));
        assert!(ctx.sink().partition_dir(&id).join("part-0.parquet").exists());

        let record = ctx.analyze(&store, &UnitId::Int(7)).unwrap();
        assert_eq!(record.series.len(), 219 - 10);
        assert!(record.stats.trend_m > 0.0);
        assert!(record.stats.diff_trend > 0.05 && record.stats.diff_trend < 0.25);
        assert!(record.stats.trend_pv < 0.01);
    }

    /// Growing-season observations only (Apr-Oct), starting a year after the
    /// default window opens.
    fn patchy_unit(id: i64, slope_per_year: f64, seed: u64) -> Vec<Observation> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.01).unwrap();
        let first = NaiveDate::from_ymd_opt(1998, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2008, 1, 1).unwrap();
        (0..)
            .map(|k| first + Duration::days(3 * k))
            .take_while(|d| *d < end)
            .filter(|d| (4..=10).contains(&d.month()))
            .map(|d| {
                let t = (d - first).num_days() as f64 / 365.25;
                let season = 0.15 * (2.0 * std::f64::consts::PI * t).sin();
                Observation {
                    unit_id: UnitId::Int(id),
                    date: Some(d),
                    value: Some(0.3 + slope_per_year * t + season + noise.sample(&mut rng)),
                    sample_count: Some(90.0),
                    sample_total: Some(100.0),
                }
            })
            .collect()
    }

    #[test]
    fn seasonal_gaps_and_a_missing_first_year_are_filled_then_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrendConfig::default();
        let ctx = PipelineContext::new(&config, dir.path().join("d.pq"), "ID_POL").unwrap();
        let obs = patchy_unit(5, 0.02, 21);

        let binned = IntervalBinner::new(ctx.grid(), &config.binning).bin(&obs);
        assert_eq!(binned.len(), 803);
        // All of 1997 plus five months of every later year.
        assert!(binned.missing_count() > 73 + 10 * 25);

        let record = ctx.analyze(&MemoryStore::new(obs), &UnitId::Int(5)).unwrap();
        assert_eq!(record.series.len(), binned.len() - DEFAULT_WARMUP_BINS);
        assert_eq!(record.series.labels.len(), record.series.len());
        assert!(record.series.values.iter().all(|v| v.is_finite()));
        assert!(record.stats.trend_m > 0.0);
        assert!(record.stats.diff_trend > 0.0);
    }

    #[test]
    fn unit_without_observations_fails_in_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let store = MemoryStore::default().with_empty_unit(UnitId::Int(1));

        assert_eq!(run_unit(&ctx, &store, &UnitId::Int(1)), Err(UnitError::AllMissing));
        assert!(!ctx.sink().partition_dir(&UnitId::Int(1)).exists());
    }

    #[test]
    fn low_quality_observations_leave_the_unit_all_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let obs: Vec<Observation> = greening_unit(2, 0.0, 3)
            .into_iter()
            .map(|o| Observation { sample_count: Some(10.0), ..o })
            .collect();
        let store = MemoryStore::new(obs);

        assert_eq!(ctx.analyze(&store, &UnitId::Int(2)), Err(UnitError::AllMissing));
    }

    #[test]
    fn rejects_windows_too_short_for_two_seasons() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("s.pq");
        let mut config = three_year_config();
        config.window.end = NaiveDate::from_ymd_opt(2003, 1, 1).unwrap();

        let err = PipelineContext::new(&config, &staging, "ID_POL").err().unwrap();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
        assert!(!staging.exists());
    }

    #[test]
    fn rejects_widths_that_do_not_divide_the_year() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = three_year_config();
        config.window.bin_width_days = 16;

        assert!(PipelineContext::new(&config, dir.path().join("s.pq"), "ID_POL").is_err());
    }

    #[test]
    fn id_field_colliding_with_an_output_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for key in ["type", "r2", "trend_m"] {
            let staging = dir.path().join(format!("{key}.pq"));
            let err = PipelineContext::new(&three_year_config(), &staging, key).err().unwrap();
            assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
            assert!(!staging.exists());
        }
    }
}
