//! Temporal regularization.
//!
//! - `interval`: the fixed bin layout shared by every unit
//! - `binner`: maps one unit's observations onto that layout

pub mod binner;
pub mod interval;

pub use binner::*;
pub use interval::*;
