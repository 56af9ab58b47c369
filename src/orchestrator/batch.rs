//! Batch orchestration over all units of a store.

use std::any::Any;
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::app::pipeline::{PipelineContext, run_unit};
use crate::domain::{BatchConfig, UnitFailure, UnitId, UnitSummary};
use crate::error::{AppError, UnitError};
use crate::io::{consolidate, write_failures_csv};
use crate::logging::{self, LogConfig};
use crate::orchestrator::Executor;
use crate::store::{ObservationStore, StoreConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Enumerating,
    Dispatching,
    Collecting,
    Consolidating,
    Completed,
    Aborted,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub units_total: usize,
    /// Successful units, in enumeration order.
    pub succeeded: Vec<UnitId>,
    /// Failed units, in enumeration order.
    pub failures: Vec<UnitFailure>,
    /// `None` when no unit succeeded.
    pub artifact: Option<PathBuf>,
    pub failure_report: Option<PathBuf>,
    pub elapsed: Duration,
}

pub struct Orchestrator<S, E> {
    store: S,
    executor: E,
    config: BatchConfig,
    state: BatchState,
    log: Option<LogConfig>,
    logger: Option<flexi_logger::LoggerHandle>,
}

impl<S: ObservationStore, E: Executor> Orchestrator<S, E> {
    pub fn new(store: S, executor: E, config: BatchConfig) -> Self {
        Self {
            store,
            executor,
            config,
            state: BatchState::Idle,
            log: None,
            logger: None,
        }
    }

    /// Route log records through flexi_logger for the runs of this
    /// orchestrator. The sink starts with the first run and stays up until
    /// the orchestrator is dropped.
    pub fn with_logging(mut self, log: LogConfig) -> Self {
        self.log = Some(log);
        self
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Run every unit once. Per-unit failures are recorded in the summary;
    /// only setup and consolidation problems return an error.
    pub fn run(&mut self) -> Result<RunSummary, AppError> {
        let started = Instant::now();
        if let Err(err) = self.start_logging() {
            self.enter(BatchState::Aborted);
            return Err(err);
        }
        match self.run_stages(started) {
            Ok(summary) => {
                self.enter(BatchState::Completed);
                Ok(summary)
            }
            Err(err) => {
                log::error!("Run aborted during {:?}: {err}", self.state);
                self.enter(BatchState::Aborted);
                Err(err)
            }
        }
    }

    fn run_stages(&mut self, started: Instant) -> Result<RunSummary, AppError> {
        log::info!(
            "Starting run '{}' on {} (id field {})",
            self.config.output_name,
            self.config.db_path.display(),
            self.config.schema.id_field
        );
        self.enter(BatchState::Enumerating);
        let units = self.enumerate()?;
        log::info!("Found {} units in {}", units.len(), self.config.db_path.display());

        let staging = self.config.staging_dir();
        let key = self.config.schema.id_field.clone();
        let ctx = PipelineContext::new(&self.config.trend, &staging, &key)?;

        self.enter(BatchState::Dispatching);
        log::info!(
            "Dispatching {} units on {} worker(s)",
            units.len(),
            self.executor.workers()
        );
        let ids: Vec<UnitId> = units.into_iter().map(|u| u.unit_id).collect();
        let store = &self.store;
        let ctx = &ctx;
        let outcomes = self.executor.execute(ids.clone(), |unit| {
            let outcome = catch_unwind(AssertUnwindSafe(|| run_unit(ctx, store, &unit)))
                .unwrap_or_else(|payload| Err(UnitError::Panicked(panic_message(payload.as_ref()))));
            (unit, outcome)
        });

        self.enter(BatchState::Collecting);
        if outcomes.len() != ids.len() {
            return Err(AppError::new(
                1,
                format!("Collected {} outcomes for {} units.", outcomes.len(), ids.len()),
            ));
        }
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for (unit, outcome) in outcomes {
            match outcome {
                Ok(id) => succeeded.push(id),
                Err(error) => {
                    log::warn!("Unit {unit} failed: {error}");
                    failures.push(UnitFailure { unit_id: unit, error });
                }
            }
        }
        log::info!("{} units succeeded, {} failed", succeeded.len(), failures.len());

        self.enter(BatchState::Consolidating);
        let failure_report = self.write_failure_report(&failures)?;
        let artifact = if succeeded.is_empty() {
            log::warn!("No unit succeeded; no artifact written");
            fs::remove_dir_all(&staging).map_err(|e| {
                AppError::output(format!("Failed to remove staging area '{}': {e}", staging.display()))
            })?;
            None
        } else {
            let path = self.config.artifact_path();
            consolidate(&staging, &key, &succeeded, &path)?;
            Some(path)
        };

        Ok(RunSummary {
            units_total: ids.len(),
            succeeded,
            failures,
            artifact,
            failure_report,
            elapsed: started.elapsed(),
        })
    }

    fn start_logging(&mut self) -> Result<(), AppError> {
        if let (None, Some(log)) = (&self.logger, &self.log) {
            self.logger = Some(logging::start(log)?);
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<Vec<UnitSummary>, AppError> {
        let conn = self
            .store
            .connect()
            .map_err(|e| AppError::store(format!("Observation store unavailable: {e}")))?;
        let mut units = conn
            .list_units()
            .map_err(|e| AppError::store(format!("Failed to enumerate units: {e}")))?;
        units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        units.dedup_by(|a, b| a.unit_id == b.unit_id);
        for u in &units {
            log::debug!(
                "Unit {}: {} observations from {:?} to {:?}",
                u.unit_id,
                u.count,
                u.min_date,
                u.max_date
            );
        }
        Ok(units)
    }

    fn write_failure_report(&self, failures: &[UnitFailure]) -> Result<Option<PathBuf>, AppError> {
        let path = self.config.failures_path();
        if failures.is_empty() {
            if path.exists() {
                log::debug!("Removing stale failure report {}", path.display());
                fs::remove_file(&path).map_err(|e| {
                    AppError::output(format!("Failed to remove '{}': {e}", path.display()))
                })?;
            }
            return Ok(None);
        }
        write_failures_csv(&path, failures)?;
        log::info!("Wrote {} failures to {}", failures.len(), path.display());
        Ok(Some(path))
    }

    fn enter(&mut self, next: BatchState) {
        log::debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
