//! Trend extraction.
//!
//! - `stl`: robust seasonal-trend decomposition, keeps the trend component
//! - `estimator`: OLS of that trend on a normalized time index

pub mod estimator;
pub mod stl;

pub use estimator::*;
pub use stl::*;
