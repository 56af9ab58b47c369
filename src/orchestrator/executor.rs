//! Task executors.
//!
//! An executor runs one closure per task and returns the results in
//! submission order. Panics are not caught here; callers wrap their closure.

use rayon::ThreadPool;
use rayon::prelude::*;

use crate::error::AppError;

pub trait Executor: Send + Sync {
    fn execute<T, R, F>(&self, tasks: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync;

    /// Worker count, for logging.
    fn workers(&self) -> usize;
}

/// Runs every task on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn execute<T, R, F>(&self, tasks: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        tasks.into_iter().map(f).collect()
    }

    fn workers(&self) -> usize {
        1
    }
}

/// Dedicated rayon pool; never touches the global pool.
pub struct ThreadPoolExecutor {
    pool: ThreadPool,
}

impl ThreadPoolExecutor {
    /// `workers == 0` sizes the pool to the available cores.
    pub fn new(workers: usize) -> Result<Self, AppError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("trend-worker-{i}"))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build worker pool: {e}")))?;
        Ok(Self { pool })
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute<T, R, F>(&self, tasks: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        self.pool
            .install(|| tasks.into_par_iter().map(&f).collect())
    }

    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}
