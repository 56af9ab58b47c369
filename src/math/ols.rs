//! Ordinary least squares with classical inference.
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! The solve goes through SVD, which stays well behaved for tall design
//! matrices and tells us when the system is too ill-conditioned to trust.
//! Inference follows the textbook homoskedastic formulas:
//!
//! - `σ² = SSE / (n - p)`
//! - `Cov(β) = σ² (XᵀX)⁻¹`
//! - `t_j = β_j / se_j`, two-sided p-values from Student's t with `n - p` dof

use nalgebra::{DMatrix, DVector};

use crate::math::stats::two_sided_p_value;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fitted OLS model.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub bse: Vec<f64>,
    pub tvalues: Vec<f64>,
    pub pvalues: Vec<f64>,
    /// `NaN` when the response has no variance (R² undefined).
    pub rsquared: f64,
    pub sse: f64,
    pub df_resid: usize,
}

/// Fit `y ~ X` and compute standard errors, t-values, p-values and R².
///
/// Returns `None` when there are no residual degrees of freedom or when
/// `XᵀX` is singular.
pub fn ols_fit(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<OlsFit> {
    let n = x.nrows();
    let p = x.ncols();
    if n != y.len() || n <= p {
        return None;
    }

    let beta = solve_least_squares(x, y)?;
    let xtx_inv = (x.transpose() * x).try_inverse()?;

    let resid = y - x * &beta;
    let sse = resid.norm_squared();
    let df_resid = n - p;
    let sigma2 = sse / df_resid as f64;

    let mean = y.mean();
    let sst: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    // Below this the centered sum of squares is rounding noise.
    let sst_floor = 1e-18 * n as f64 * (1.0 + mean * mean);
    let rsquared = if sst > sst_floor { 1.0 - sse / sst } else { f64::NAN };

    let params: Vec<f64> = beta.iter().copied().collect();
    let bse: Vec<f64> = (0..p)
        .map(|j| (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt())
        .collect();
    let tvalues: Vec<f64> = params
        .iter()
        .zip(&bse)
        .map(|(&b, &se)| t_value(b, se))
        .collect();
    let pvalues = tvalues
        .iter()
        .map(|&t| two_sided_p_value(t, df_resid as f64))
        .collect();

    Some(OlsFit {
        params,
        bse,
        tvalues,
        pvalues,
        rsquared,
        sse,
        df_resid,
    })
}

fn t_value(estimate: f64, se: f64) -> f64 {
    if se > 0.0 {
        estimate / se
    } else if estimate == 0.0 {
        f64::NAN
    } else {
        f64::INFINITY.copysign(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn inference_matches_hand_computation() {
        // x = [0,1,2,3], y = [1,3,2,5]
        // β1 = 1.1, β0 = 1.1, SSE = 2.7, σ² = 1.35
        // Sxx = 5 -> se(β1) = sqrt(1.35/5), se(β0) = sqrt(1.35 * (1/4 + 2.25/5))
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 3.0, 2.0, 5.0]);
        let fit = ols_fit(&x, &y).unwrap();

        assert!((fit.params[0] - 1.1).abs() < 1e-10);
        assert!((fit.params[1] - 1.1).abs() < 1e-10);
        assert!((fit.sse - 2.7).abs() < 1e-10);
        assert!((fit.bse[1] - (1.35f64 / 5.0).sqrt()).abs() < 1e-10);
        assert!((fit.bse[0] - (1.35f64 * 0.7).sqrt()).abs() < 1e-10);
        // SST = 8.75
        assert!((fit.rsquared - (1.0 - 2.7 / 8.75)).abs() < 1e-10);
        assert_eq!(fit.df_resid, 2);
        assert!(fit.pvalues.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn flat_response_has_undefined_r2() {
        let x = DMatrix::from_fn(6, 2, |i, j| if j == 0 { 1.0 } else { i as f64 });
        let y = DVector::from_element(6, 0.3);
        let fit = ols_fit(&x, &y).unwrap();
        assert!(fit.rsquared.is_nan());
        assert!(fit.params[1].abs() < 1e-12);
    }

    #[test]
    fn no_residual_dof_returns_none() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(ols_fit(&x, &y).is_none());
    }
}
