//! Output side of a run.
//!
//! - per-unit Parquet partitions (`partition`)
//! - merge into the final artifact (`consolidate`)
//! - CSV report of failed units (`failures`)

pub mod consolidate;
pub mod failures;
pub mod partition;

pub use consolidate::*;
pub use failures::*;
pub use partition::*;
