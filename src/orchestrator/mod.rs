//! Enumerate units, run the per-unit pipeline on an executor, consolidate.
//!
//! A run moves through `Enumerating -> Dispatching -> Collecting ->
//! Consolidating -> Completed`, or stops in `Aborted` when setup or
//! consolidation fails. Unit failures never abort a run.

pub mod batch;
pub mod executor;

pub use batch::*;
pub use executor::*;
