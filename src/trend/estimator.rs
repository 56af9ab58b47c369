//! Linear trend estimation on the decomposed trend component.
//!
//! The time index is normalized to `x_i = i / n`, so the slope reads as the
//! change over the whole window, while `diff_trend` (last minus first trend
//! value) reports the realized net change.

use nalgebra::{DMatrix, DVector};

use crate::domain::TrendStats;
use crate::error::UnitError;
use crate::math::ols_fit;

pub fn estimate_trend(trend: &[f64]) -> Result<TrendStats, UnitError> {
    let n = trend.len();
    if n < 3 {
        return Err(UnitError::SeriesTooShort { len: n, required: 3 });
    }
    if trend.iter().any(|v| !v.is_finite()) {
        return Err(UnitError::NonFinite("trend component"));
    }

    let x = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { i as f64 / n as f64 });
    let y = DVector::from_column_slice(trend);
    let fit = ols_fit(&x, &y).ok_or(UnitError::SingularRegression)?;

    Ok(TrendStats {
        intercept_m: fit.params[0],
        intercept_sd: fit.bse[0],
        intercept_tv: fit.tvalues[0],
        intercept_pv: fit.pvalues[0],
        trend_m: fit.params[1],
        trend_sd: fit.bse[1],
        trend_tv: fit.tvalues[1],
        trend_pv: fit.pvalues[1],
        r2: fit.rsquared,
        diff_trend: trend[n - 1] - trend[0],
    })
}
