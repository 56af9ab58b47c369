//! Seasonal convolution gap-filling.
//!
//! A missing bin is rebuilt as the weighted mean of every present bin. The
//! weight of a neighbour at lag `d` combines two attenuations (in dB):
//!
//! ```text
//! w(d) = 10^(-(att_seas * phase(d) + att_env * |d| / n) / 10)
//! ```
//!
//! - `phase(d)` is 0 for lags that are whole seasons and 1 for lags half a
//!   season off, so same-phase values dominate the reconstruction.
//! - the envelope term prefers nearby years over distant ones.
//!
//! The kernel only depends on `|d|`, so it is computed once per series.

use crate::domain::GapFillConfig;
use crate::gapfill::GapFiller;

#[derive(Debug, Clone)]
pub struct SeasonalConvolution {
    att_seas_db: f64,
    att_env_db: f64,
}

impl SeasonalConvolution {
    pub fn new(config: &GapFillConfig) -> Self {
        Self {
            att_seas_db: config.att_seas_db,
            att_env_db: config.att_env_db,
        }
    }

    fn kernel(&self, n: usize, season_size: usize) -> Vec<f64> {
        let half = season_size as f64 / 2.0;
        (0..n)
            .map(|lag| {
                let phase = if season_size > 1 {
                    let r = lag % season_size;
                    r.min(season_size - r) as f64 / half
                } else {
                    0.0
                };
                let env = lag as f64 / n as f64;
                let att_db = self.att_seas_db * phase + self.att_env_db * env;
                10f64.powf(-att_db / 10.0)
            })
            .collect()
    }
}

impl Default for SeasonalConvolution {
    fn default() -> Self {
        Self::new(&GapFillConfig::default())
    }
}

impl GapFiller for SeasonalConvolution {
    fn fill(&self, values: &[Option<f64>], season_size: usize) -> Vec<Option<f64>> {
        let n = values.len();
        let present: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
            .collect();

        if present.len() == n || present.is_empty() {
            return values.to_vec();
        }

        let kernel = self.kernel(n, season_size.max(1));
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if let Some(x) = v.filter(|x| x.is_finite()) {
                    return Some(x);
                }
                let mut num = 0.0;
                let mut den = 0.0;
                for &(j, x) in &present {
                    let w = kernel[i.abs_diff(j)];
                    num += w * x;
                    den += w;
                }
                (den > 0.0).then(|| num / den)
            })
            .collect()
    }
}
