//! Mathematical utilities: least squares, LOESS smoothing, small statistics.

pub mod loess;
pub mod ols;
pub mod stats;

pub use loess::*;
pub use ols::*;
pub use stats::*;
