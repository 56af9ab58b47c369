//! LOESS primitives used by the seasonal-trend decomposition.
//!
//! Positions are the integers `1..=n` (evenly spaced series). A local fit at
//! position `xs` uses the points `nleft..=nright` with tricube distance
//! weights, optionally multiplied by robustness weights, and a degree 0
//! (weighted mean) or degree 1 (weighted line) local model.
//!
//! `loess_smooth` evaluates the fit every `jump` positions and linearly
//! interpolates in between, which is what makes long smoothing windows
//! affordable on long series.

/// Local weighted regression estimate at `xs` over `nleft..=nright` (1-based).
///
/// `work` must be at least `y.len()` long. Returns `None` when every weight
/// vanishes (e.g. all robustness weights in the window are zero).
pub fn loess_estimate(
    y: &[f64],
    window: usize,
    degree: usize,
    xs: f64,
    nleft: usize,
    nright: usize,
    robustness: Option<&[f64]>,
    work: &mut [f64],
) -> Option<f64> {
    let n = y.len();
    let range = n as f64 - 1.0;

    let mut h = (xs - nleft as f64).max(nright as f64 - xs);
    if window > n {
        h += ((window - n) / 2) as f64;
    }
    let h9 = 0.999 * h;
    let h1 = 0.001 * h;

    let mut total = 0.0;
    for j in nleft..=nright {
        let w = &mut work[j - 1];
        *w = 0.0;
        let r = (j as f64 - xs).abs();
        if r <= h9 {
            *w = if r <= h1 {
                1.0
            } else {
                (1.0 - (r / h).powi(3)).powi(3)
            };
            if let Some(rw) = robustness {
                *w *= rw[j - 1];
            }
            total += *w;
        }
    }

    if total <= 0.0 {
        return None;
    }
    for w in &mut work[nleft - 1..nright] {
        *w /= total;
    }

    if h > 0.0 && degree > 0 {
        let center: f64 = (nleft..=nright).map(|j| work[j - 1] * j as f64).sum();
        let spread: f64 = (nleft..=nright)
            .map(|j| work[j - 1] * (j as f64 - center).powi(2))
            .sum();
        if spread.sqrt() > 0.001 * range {
            let slope = (xs - center) / spread;
            for j in nleft..=nright {
                work[j - 1] *= slope * (j as f64 - center) + 1.0;
            }
        }
    }

    Some((nleft..=nright).map(|j| work[j - 1] * y[j - 1]).sum())
}

/// Smooth `y` with a LOESS of the given window, degree and jump.
///
/// Positions where the local fit is undefined keep their input value.
pub fn loess_smooth(
    y: &[f64],
    window: usize,
    degree: usize,
    jump: usize,
    robustness: Option<&[f64]>,
) -> Vec<f64> {
    let n = y.len();
    let mut ys = vec![0.0; n];
    if n == 0 {
        return ys;
    }
    if n < 2 {
        ys[0] = y[0];
        return ys;
    }

    let mut work = vec![0.0; n];
    let mut estimate = |xs: usize, nleft: usize, nright: usize| {
        loess_estimate(y, window, degree, xs as f64, nleft, nright, robustness, &mut work)
            .unwrap_or(y[xs - 1])
    };

    let jump = jump.clamp(1, n - 1);
    if window >= n {
        for i in (1..=n).step_by(jump) {
            ys[i - 1] = estimate(i, 1, n);
        }
    } else if jump == 1 {
        let half = (window + 1) / 2;
        let (mut nleft, mut nright) = (1, window);
        for i in 1..=n {
            if i > half && nright != n {
                nleft += 1;
                nright += 1;
            }
            ys[i - 1] = estimate(i, nleft, nright);
        }
    } else {
        let half = (window + 1) / 2;
        for i in (1..=n).step_by(jump) {
            let (nleft, nright) = if i < half {
                (1, window)
            } else if i >= n - half + 1 {
                (n - window + 1, n)
            } else {
                (i - half + 1, window + i - half)
            };
            ys[i - 1] = estimate(i, nleft, nright);
        }
    }

    if jump != 1 {
        let mut i = 1;
        while i + jump <= n {
            let delta = (ys[i + jump - 1] - ys[i - 1]) / jump as f64;
            for j in (i + 1)..(i + jump) {
                ys[j - 1] = ys[i - 1] + delta * (j - i) as f64;
            }
            i += jump;
        }

        let last = ((n - 1) / jump) * jump + 1;
        if last != n {
            let nleft = if window >= n { 1 } else { n - window + 1 };
            ys[n - 1] = estimate(n, nleft, n);
            if last != n - 1 {
                let delta = (ys[n - 1] - ys[last - 1]) / (n - last) as f64;
                for j in (last + 1)..n {
                    ys[j - 1] = ys[last - 1] + delta * (j - last) as f64;
                }
            }
        }
    }

    ys
}

/// Moving average of length `len`; output has `x.len() - len + 1` values.
pub fn moving_average(x: &[f64], len: usize) -> Vec<f64> {
    if len == 0 || x.len() < len {
        return Vec::new();
    }
    let out_len = x.len() - len + 1;
    let mut out = Vec::with_capacity(out_len);
    let mut sum: f64 = x[..len].iter().sum();
    out.push(sum / len as f64);
    for j in 1..out_len {
        sum += x[j + len - 1] - x[j - 1];
        out.push(sum / len as f64);
    }
    out
}
