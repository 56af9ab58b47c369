//! Gap-filling boundary.
//!
//! The pipeline only relies on the [`GapFiller`] contract:
//!
//! - output has the same length as the input
//! - present entries come back unchanged
//! - missing entries are reconstructed when possible, otherwise stay `None`
//!
//! Edge distortion near the start of the series is the caller's problem: the
//! pipeline drops its warm-up bins after filling.

pub mod seasconv;

pub use seasconv::SeasonalConvolution;

pub trait GapFiller: Send + Sync {
    fn fill(&self, values: &[Option<f64>], season_size: usize) -> Vec<Option<f64>>;
}
