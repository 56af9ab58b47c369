//! Interval grid generation.
//!
//! The analysis window is cut into fixed-width, contiguous bins. With leap-day
//! exclusion on, Feb 29 is absorbed into whichever bin contains it, so every
//! year starts its bins on the same calendar days and the number of bins per
//! year is exactly `365 / width`.

use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::{TemporalBin, WindowConfig};
use crate::error::AppError;

/// Days in a year once Feb 29 is excluded.
const DAYS_PER_YEAR: u32 = 365;

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalGrid {
    bins: Vec<TemporalBin>,
    bin_width_days: u32,
}

impl IntervalGrid {
    /// Build the grid for `window`; each bin is labelled `end - label_offset_days`.
    pub fn new(window: &WindowConfig, label_offset_days: i64) -> Result<Self, AppError> {
        if window.bin_width_days == 0 {
            return Err(AppError::config("Bin width must be >= 1 day."));
        }
        if window.end <= window.start {
            return Err(AppError::config(format!(
                "Invalid analysis window: start={} end={} (end must be after start).",
                window.start, window.end
            )));
        }

        let width = Duration::days(i64::from(window.bin_width_days));
        let one_day = Duration::days(1);
        let offset = Duration::days(label_offset_days);

        let mut bins = Vec::new();
        let mut cursor = window.start;
        while cursor < window.end {
            let mut end = cursor + width - one_day;
            if window.skip_leap_day && contains_leap_day(cursor, end) {
                end += one_day;
            }
            bins.push(TemporalBin {
                start: cursor,
                end,
                label: end - offset,
            });
            cursor = end + one_day;
        }

        Ok(Self {
            bins,
            bin_width_days: window.bin_width_days,
        })
    }

    pub fn bins(&self) -> &[TemporalBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn labels(&self) -> Vec<NaiveDate> {
        self.bins.iter().map(|b| b.label).collect()
    }

    /// Number of bins per annual cycle.
    ///
    /// Requires the bin width to divide the (leap-day free) year, the window
    /// to span whole cycles, and every cycle to start on the same calendar day.
    pub fn season_size(&self) -> Result<usize, AppError> {
        if DAYS_PER_YEAR % self.bin_width_days != 0 {
            return Err(AppError::config(format!(
                "Bin width of {} days does not divide a {DAYS_PER_YEAR}-day year; season size would not be an integer.",
                self.bin_width_days
            )));
        }
        let season = (DAYS_PER_YEAR / self.bin_width_days) as usize;

        if self.bins.len() % season != 0 {
            return Err(AppError::config(format!(
                "Window holds {} bins, not a whole number of {season}-bin seasons.",
                self.bins.len()
            )));
        }

        let anchor = self.bins[0].start;
        for (cycle, bin) in self.bins.iter().step_by(season).enumerate() {
            if (bin.start.month(), bin.start.day()) != (anchor.month(), anchor.day()) {
                return Err(AppError::config(format!(
                    "Season {cycle} starts on {} instead of {:02}-{:02}; enable leap-day exclusion or change the window.",
                    bin.start,
                    anchor.month(),
                    anchor.day()
                )));
            }
        }

        Ok(season)
    }
}

fn contains_leap_day(start: NaiveDate, end: NaiveDate) -> bool {
    (start.year()..=end.year()).any(|year| {
        NaiveDate::from_ymd_opt(year, 2, 29).is_some_and(|d| start <= d && d <= end)
    })
}
