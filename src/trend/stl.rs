//! Robust additive seasonal-trend decomposition (STL).
//!
//! Implements the inner/outer loop of Cleveland, Cleveland, McRae & Terpenning
//! (1990). Each inner pass:
//!
//! 1. detrends the series
//! 2. smooths every cycle-subseries (one per seasonal phase), extending each
//!    by one period on both ends
//! 3. low-pass filters the result (moving averages of `period`, `period`, 3,
//!    then a LOESS) and removes it from the seasonal estimate
//! 4. smooths the deseasonalized series into the trend
//!
//! Outer passes recompute bisquare robustness weights from the residuals so
//! isolated outliers stop pulling the trend.

use crate::domain::DecompositionConfig;
use crate::error::{AppError, UnitError};
use crate::math::{loess_estimate, loess_smooth, median_mut, moving_average};

/// STL smoother settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StlParams {
    pub period: usize,
    pub seasonal: usize,
    pub trend: usize,
    pub low_pass: usize,
    pub seasonal_deg: usize,
    pub trend_deg: usize,
    pub low_pass_deg: usize,
    pub seasonal_jump: usize,
    pub trend_jump: usize,
    pub low_pass_jump: usize,
    pub inner_iter: usize,
    pub outer_iter: usize,
}

impl StlParams {
    /// Parameters for a `period`-bin season with the given seasonal and trend windows.
    ///
    /// The low-pass window is the smallest odd number above the period. Every
    /// smoother is evaluated at every point (jump 1). Robust mode runs 2 inner
    /// and 15 outer iterations, plain mode 5 inner and none outer.
    pub fn new(period: usize, seasonal: usize, trend: usize, robust: bool) -> Result<Self, AppError> {
        if period < 2 {
            return Err(AppError::config(format!("Seasonal period must be >= 2 (got {period}).")));
        }
        for (name, len) in [("seasonal", seasonal), ("trend", trend)] {
            if len < 3 || len % 2 == 0 {
                return Err(AppError::config(format!(
                    "STL {name} window must be odd and >= 3 (got {len})."
                )));
            }
        }
        if trend <= period {
            return Err(AppError::config(format!(
                "STL trend window ({trend}) must exceed the period ({period})."
            )));
        }

        let low_pass = if period % 2 == 0 { period + 1 } else { period + 2 };
        let (inner_iter, outer_iter) = if robust { (2, 15) } else { (5, 0) };

        Ok(Self {
            period,
            seasonal,
            trend,
            low_pass,
            seasonal_deg: 1,
            trend_deg: 1,
            low_pass_deg: 1,
            seasonal_jump: 1,
            trend_jump: 1,
            low_pass_jump: 1,
            inner_iter,
            outer_iter,
        })
    }
}

/// Decomposition output; all components have the input's length.
#[derive(Debug, Clone)]
pub struct StlResult {
    pub seasonal: Vec<f64>,
    pub trend: Vec<f64>,
    pub residual: Vec<f64>,
    /// Final robustness weights (all ones in non-robust mode).
    pub weights: Vec<f64>,
}

/// Decompose `y` into seasonal, trend and residual components.
pub fn stl(y: &[f64], params: &StlParams) -> Result<StlResult, UnitError> {
    let n = y.len();
    let np = params.period;
    if n < 2 * np {
        return Err(UnitError::SeriesTooShort {
            len: n,
            required: 2 * np,
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(UnitError::NonFinite("decomposition input"));
    }

    let mut trend = vec![0.0; n];
    let mut seasonal = vec![0.0; n];
    let mut weights = vec![1.0; n];
    let mut use_weights = false;

    let mut pass = 0;
    loop {
        let rw = use_weights.then_some(weights.as_slice());
        inner_loop(y, params, rw, &mut seasonal, &mut trend);
        pass += 1;
        if pass > params.outer_iter {
            break;
        }
        let fit: Vec<f64> = trend.iter().zip(&seasonal).map(|(t, s)| t + s).collect();
        weights = robustness_weights(y, &fit);
        use_weights = true;
    }

    if params.outer_iter == 0 {
        weights.iter_mut().for_each(|w| *w = 1.0);
    }

    if trend.iter().chain(&seasonal).any(|v| !v.is_finite()) {
        return Err(UnitError::Decomposition(
            "non-finite component after smoothing".to_string(),
        ));
    }

    let residual = y
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((v, t), s)| v - t - s)
        .collect();

    Ok(StlResult {
        seasonal,
        trend,
        residual,
        weights,
    })
}

fn inner_loop(
    y: &[f64],
    params: &StlParams,
    rw: Option<&[f64]>,
    seasonal: &mut [f64],
    trend: &mut [f64],
) {
    let n = y.len();
    let np = params.period;

    for _ in 0..params.inner_iter {
        let detrended: Vec<f64> = y.iter().zip(trend.iter()).map(|(v, t)| v - t).collect();
        let cycle = cycle_subseries(&detrended, params, rw);

        let low = moving_average(&moving_average(&moving_average(&cycle, np), np), 3);
        let low = loess_smooth(&low, params.low_pass, params.low_pass_deg, params.low_pass_jump, None);

        for i in 0..n {
            seasonal[i] = cycle[np + i] - low[i];
        }

        let deseasonalized: Vec<f64> = y.iter().zip(seasonal.iter()).map(|(v, s)| v - s).collect();
        let smoothed = loess_smooth(&deseasonalized, params.trend, params.trend_deg, params.trend_jump, rw);
        trend.copy_from_slice(&smoothed);
    }
}

/// Smooth each seasonal phase separately, extended one period on both ends.
///
/// Output has `n + 2 * period` values; phase `j` occupies indices
/// `j, j + period, j + 2 * period, ...`.
fn cycle_subseries(x: &[f64], params: &StlParams, rw: Option<&[f64]>) -> Vec<f64> {
    let n = x.len();
    let np = params.period;
    let ns = params.seasonal;
    let mut out = vec![0.0; n + 2 * np];

    for j in 0..np {
        let sub: Vec<f64> = x.iter().skip(j).step_by(np).copied().collect();
        let sub_rw: Option<Vec<f64>> = rw.map(|w| w.iter().skip(j).step_by(np).copied().collect());
        let k = sub.len();

        let smoothed = loess_smooth(&sub, ns, params.seasonal_deg, params.seasonal_jump, sub_rw.as_deref());

        let mut work = vec![0.0; k];
        let left = loess_estimate(
            &sub,
            ns,
            params.seasonal_deg,
            0.0,
            1,
            ns.min(k),
            sub_rw.as_deref(),
            &mut work,
        )
        .unwrap_or(smoothed[0]);
        let right = loess_estimate(
            &sub,
            ns,
            params.seasonal_deg,
            (k + 1) as f64,
            (k + 1).saturating_sub(ns).max(1),
            k,
            sub_rw.as_deref(),
            &mut work,
        )
        .unwrap_or(smoothed[k - 1]);

        out[j] = left;
        for (m, v) in smoothed.iter().enumerate() {
            out[j + (m + 1) * np] = *v;
        }
        out[j + (k + 1) * np] = right;
    }

    out
}

/// Bisquare weights on residuals scaled by six median absolute residuals.
fn robustness_weights(y: &[f64], fit: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = y.iter().zip(fit).map(|(v, f)| (v - f).abs()).collect();
    let mut sorted = abs.clone();
    let cmad = 6.0 * median_mut(&mut sorted).unwrap_or(0.0);

    // A perfect fit leaves nothing to down-weight.
    if !(cmad.is_finite() && cmad > f64::MIN_POSITIVE) {
        return vec![1.0; y.len()];
    }

    let c9 = 0.999 * cmad;
    let c1 = 0.001 * cmad;
    abs.iter()
        .map(|&r| {
            if r <= c1 {
                1.0
            } else if r <= c9 {
                (1.0 - (r / cmad).powi(2)).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

/// Extracts the trend component of a gap-filled series.
#[derive(Debug, Clone)]
pub struct TrendDecomposer {
    params: StlParams,
}

impl TrendDecomposer {
    /// Trend window is `2 * season_size + 1`; the seasonal smoother defaults to
    /// `season_size + 2`, bumped to the next odd length when needed.
    pub fn new(season_size: usize, config: &DecompositionConfig) -> Result<Self, AppError> {
        let seasonal = config.seasonal_smooth.unwrap_or_else(|| {
            let ns = season_size + 2;
            if ns % 2 == 0 { ns + 1 } else { ns }
        });
        let params = StlParams::new(season_size, seasonal, 2 * season_size + 1, config.robust)?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &StlParams {
        &self.params
    }

    /// Minimum series length the decomposition accepts.
    pub fn min_len(&self) -> usize {
        2 * self.params.period
    }

    pub fn trend(&self, series: &[f64]) -> Result<Vec<f64>, UnitError> {
        Ok(stl(series, &self.params)?.trend)
    }
}
