//! Error types.
//!
//! Two layers:
//!
//! - [`AppError`]: fatal, process-level failures (configuration, store
//!   unavailable, consolidation). Each carries the exit code of the `trend`
//!   binary.
//! - [`UnitError`]: failures confined to a single unit. These are recorded in
//!   the run summary and never abort the batch.

use thiserror::Error;

/// Exit code for invalid configuration (grid, windows, identifiers).
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when the observation store cannot be reached.
pub const EXIT_STORE: u8 = 3;
/// Exit code for output staging and consolidation failures.
pub const EXIT_OUTPUT: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(EXIT_STORE, message)
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::new(EXIT_OUTPUT, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Per-unit failure. Recorded, never propagated past the pipeline boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UnitError {
    #[error("store read failed: {0}")]
    Store(String),

    #[error("no admissible observation in any bin")]
    AllMissing,

    #[error("{missing} bins could not be gap-filled")]
    Unfillable { missing: usize },

    #[error("series too short: {len} values, need at least {required}")]
    SeriesTooShort { len: usize, required: usize },

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("decomposition failed: {0}")]
    Decomposition(String),

    #[error("singular trend regression")]
    SingularRegression,

    #[error("output write failed: {0}")]
    Output(String),

    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

impl UnitError {
    /// Short machine-friendly tag, used in the failure report.
    pub fn kind(&self) -> &'static str {
        match self {
            UnitError::Store(_) => "store",
            UnitError::AllMissing => "all_missing",
            UnitError::Unfillable { .. } => "unfillable",
            UnitError::SeriesTooShort { .. } => "too_short",
            UnitError::NonFinite(_) => "non_finite",
            UnitError::Decomposition(_) => "decomposition",
            UnitError::SingularRegression => "singular_regression",
            UnitError::Output(_) => "output",
            UnitError::Panicked(_) => "panic",
        }
    }
}
