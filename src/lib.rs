//! `unit-trends` library crate.
//!
//! The binary (`trend`) is a thin wrapper around this library so that the
//! per-unit pipeline, the stores and the orchestrator are testable without
//! spawning processes.

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod gapfill;
pub mod grid;
pub mod io;
pub mod logging;
pub mod math;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod trend;
