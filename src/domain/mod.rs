//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations and unit identifiers as read from the store
//! - regularized series (`BinnedSeries`, `FilledSeries`)
//! - per-unit outputs (`TrendStats`, `OutputRecord`)
//! - run configuration (`TrendConfig`, `BatchConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
