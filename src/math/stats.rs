//! Small statistical helpers shared by the decomposition and the trend fit.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Median of `values` (sorts in place). `None` for an empty slice.
pub fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
///
/// Infinite statistics map to 0, NaN statistics (and invalid `df`) to NaN.
pub fn two_sided_p_value(t: f64, df: f64) -> f64 {
    if t.is_nan() {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}
