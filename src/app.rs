//! Top-level application flow.
//!
//! `src/main.rs` stays tiny; this module is the real main:
//! - loads `.env` and parses CLI arguments
//! - runs the batch over every unit of the store, logging through the
//!   orchestrator
//! - prints the run summary

use clap::Parser;

use crate::cli::Cli;
use crate::domain::{
    BatchConfig, BinningConfig, DecompositionConfig, GapFillConfig, StoreSchema, TrendConfig,
    WindowConfig,
};
use crate::error::AppError;
use crate::logging::LogConfig;
use crate::orchestrator::{Orchestrator, SequentialExecutor, ThreadPoolExecutor};
use crate::store::SqliteStore;

pub mod pipeline;

/// Entry point for the `trend` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = batch_config_from_args(&cli);
    let log = log_config_from_args(&cli);

    let store = SqliteStore::new(&config.db_path, &config.schema)
        .map_err(|e| AppError::config(e.to_string()))?;

    let summary = if config.sequential {
        Orchestrator::new(store, SequentialExecutor, config.clone())
            .with_logging(log)
            .run()?
    } else {
        let executor = ThreadPoolExecutor::new(config.workers)?;
        Orchestrator::new(store, executor, config.clone())
            .with_logging(log)
            .run()?
    };

    println!("{}", crate::report::format_run_summary(&summary, &config));
    Ok(())
}

pub fn batch_config_from_args(cli: &Cli) -> BatchConfig {
    BatchConfig {
        db_path: cli.db.clone(),
        schema: StoreSchema {
            table: cli.table.clone(),
            id_field: cli.id_field.clone(),
            date_column: cli.date_column.clone(),
            value_column: cli.value_column.clone(),
            count_column: cli.count_column.clone(),
            total_column: cli.total_column.clone(),
        },
        output_name: cli.output_name.clone(),
        output_dir: cli.output_dir.clone(),
        workers: cli.workers,
        sequential: cli.sequential,
        trend: TrendConfig {
            window: WindowConfig {
                start: cli.start,
                end: cli.end,
                bin_width_days: cli.bin_width,
                skip_leap_day: !cli.keep_leap_day,
            },
            binning: BinningConfig {
                filter: cli.filter,
                min_quality: cli.min_quality,
                value_floor: cli.value_floor,
                label_offset_days: cli.label_offset,
            },
            gapfill: GapFillConfig::default(),
            decomposition: DecompositionConfig {
                seasonal_smooth: cli.seasonal_smooth,
                robust: !cli.no_robust,
            },
            warmup_bins: cli.warmup,
            ..TrendConfig::default()
        },
    }
}

pub fn log_config_from_args(cli: &Cli) -> LogConfig {
    LogConfig {
        level: cli.log_level.clone(),
        directory: cli.log_dir.clone(),
        ..LogConfig::default()
    }
}
