//! Log sink setup.
//!
//! Library code only uses the `log` macros. An `Orchestrator` given a
//! [`LogConfig`] calls [`start`] before its first run; embedders that install
//! their own logger simply leave it out.

use std::path::PathBuf;

use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// flexi_logger spec, e.g. `info` or `info,unit_trends::store=debug`.
    pub level: String,
    pub directory: PathBuf,
    pub basename: String,
    pub rotate_bytes: u64,
    pub keep_files: usize,
    /// Echo warnings and errors to stderr.
    pub echo: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
            basename: "trend".to_string(),
            rotate_bytes: 500 * 1024 * 1024,
            keep_files: 5,
            echo: true,
        }
    }
}

/// Start file logging. Keep the returned handle alive for the whole run.
pub fn start(config: &LogConfig) -> Result<LoggerHandle, AppError> {
    let logger = Logger::try_with_str(&config.level)
        .map_err(|e| AppError::config(format!("Invalid log level '{}': {e}", config.level)))?
        .log_to_file(
            FileSpec::default()
                .directory(&config.directory)
                .basename(&config.basename),
        )
        .duplicate_to_stderr(if config.echo { Duplicate::Warn } else { Duplicate::None })
        .rotate(
            Criterion::Size(config.rotate_bytes),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(config.keep_files),
        );

    logger.start().map_err(|e| {
        AppError::config(format!(
            "Failed to start logging in '{}': {e}",
            config.directory.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_rotate_at_500_mb() {
        let config = LogConfig::default();
        assert_eq!(config.rotate_bytes, 524_288_000);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn bad_level_spec_is_a_config_error() {
        let config = LogConfig {
            level: "unit_trends=loud".to_string(),
            ..LogConfig::default()
        };
        // Parsing fails before any file is touched.
        let err = start(&config).err().unwrap();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }
}
