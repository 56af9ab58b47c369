//! Regularize irregular observations onto the interval grid.
//!
//! Per bin we keep the observations dated inside `start..=end` that pass the
//! admissibility filter and average their values. A bin with no admitted
//! observation is missing (`None`), and a unit with no observations at all
//! yields a fully-missing series rather than an error.

use chrono::NaiveDate;

use crate::domain::{BinFilter, BinnedSeries, BinningConfig, Observation};
use crate::grid::IntervalGrid;

pub struct IntervalBinner<'a> {
    grid: &'a IntervalGrid,
    config: &'a BinningConfig,
}

impl<'a> IntervalBinner<'a> {
    pub fn new(grid: &'a IntervalGrid, config: &'a BinningConfig) -> Self {
        Self { grid, config }
    }

    /// Bin the observations of a single unit.
    ///
    /// Input order does not matter; observations without a date or with a
    /// non-finite value never contribute.
    pub fn bin(&self, observations: &[Observation]) -> BinnedSeries {
        let mut admitted: Vec<(NaiveDate, f64)> = observations
            .iter()
            .filter(|o| self.admits(o))
            .filter_map(|o| match (o.date, o.value) {
                (Some(d), Some(v)) if v.is_finite() => Some((d, v)),
                _ => None,
            })
            .collect();
        admitted.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let values = self
            .grid
            .bins()
            .iter()
            .map(|bin| {
                let lo = admitted.partition_point(|(d, _)| *d < bin.start);
                let hi = admitted.partition_point(|(d, _)| *d <= bin.end);
                mean(admitted[lo..hi].iter().map(|(_, v)| *v))
            })
            .collect();

        BinnedSeries {
            labels: self.grid.labels(),
            values,
        }
    }

    fn admits(&self, obs: &Observation) -> bool {
        let quality_ok = obs
            .quality()
            .is_some_and(|q| q >= self.config.min_quality);
        match self.config.filter {
            BinFilter::Quality => quality_ok,
            BinFilter::QualityOrValue => {
                quality_ok || obs.value.is_some_and(|v| v > self.config.value_floor)
            }
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UnitId, WindowConfig};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn grid() -> IntervalGrid {
        let window = WindowConfig {
            start: date(2001, 1, 1),
            end: date(2002, 1, 1),
            bin_width_days: 5,
            skip_leap_day: true,
        };
        IntervalGrid::new(&window, 2).unwrap()
    }

    fn obs(d: NaiveDate, value: f64, count: f64, total: f64) -> Observation {
        Observation {
            unit_id: UnitId::Int(7),
            date: Some(d),
            value: Some(value),
            sample_count: Some(count),
            sample_total: Some(total),
        }
    }

    #[test]
    fn averages_admitted_observations_per_bin() {
        let grid = grid();
        let config = BinningConfig::default();
        let observations = vec![
            obs(date(2001, 1, 1), 0.4, 90.0, 100.0),
            obs(date(2001, 1, 5), 0.6, 80.0, 100.0),
            // Below the quality threshold: ignored.
            obs(date(2001, 1, 3), 5.0, 10.0, 100.0),
            obs(date(2001, 1, 6), 0.3, 100.0, 100.0),
        ];

        let series = IntervalBinner::new(&grid, &config).bin(&observations);
        assert_eq!(series.len(), grid.len());
        assert!((series.values[0].unwrap() - 0.5).abs() < 1e-12);
        assert!((series.values[1].unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(series.values[2], None);
        assert_eq!(series.labels[0], date(2001, 1, 3));
    }

    #[test]
    fn quality_or_value_filter_admits_positive_values() {
        let grid = grid();
        let config = BinningConfig {
            filter: BinFilter::QualityOrValue,
            label_offset_days: 8,
            ..BinningConfig::default()
        };
        let observations = vec![
            obs(date(2001, 1, 2), 0.2, 1.0, 100.0),
            obs(date(2001, 1, 7), -0.1, 1.0, 100.0),
        ];
        let series = IntervalBinner::new(&grid, &config).bin(&observations);
        assert_eq!(series.values[0], Some(0.2));
        assert_eq!(series.values[1], None);
    }

    #[test]
    fn undated_and_non_finite_observations_are_skipped() {
        let grid = grid();
        let config = BinningConfig::default();
        let mut undated = obs(date(2001, 1, 1), 0.9, 100.0, 100.0);
        undated.date = None;
        let nan = obs(date(2001, 1, 2), f64::NAN, 100.0, 100.0);

        let series = IntervalBinner::new(&grid, &config).bin(&[undated, nan]);
        assert!(series.is_all_missing());
    }

    #[test]
    fn no_observations_gives_an_all_missing_series() {
        let grid = grid();
        let config = BinningConfig::default();
        let series = IntervalBinner::new(&grid, &config).bin(&[]);
        assert_eq!(series.len(), 73);
        assert!(series.is_all_missing());
    }

    #[test]
    fn binning_is_idempotent_and_order_independent() {
        let grid = grid();
        let config = BinningConfig::default();
        let mut observations: Vec<Observation> = (0..200)
            .map(|i| {
                let d = date(2001, 1, 1) + chrono::Duration::days((i * 7) % 365);
                obs(d, (i as f64 * 0.37).sin(), 50.0 + (i % 50) as f64, 100.0)
            })
            .collect();

        let binner = IntervalBinner::new(&grid, &config);
        let first = binner.bin(&observations);
        assert_eq!(first, binner.bin(&observations));

        observations.reverse();
        assert_eq!(first, binner.bin(&observations));
    }
}
