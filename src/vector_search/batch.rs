//! Batched query execution shared by the exact and approximate searchers.

use std::time::Duration;

use rayon::prelude::*;

use crate::error::{Result, VantageError};
use crate::util::deadline::{Deadline, check_deadline};
use crate::vector_search::result::SearchResult;

/// One entry per query, in input order.
pub type BatchResults = Vec<Result<SearchResult>>;

/// Options for a batched search call.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Run queries concurrently on a worker pool.
    pub parallel: bool,
    /// Abort the whole call on the first failing query.
    pub fail_fast: bool,
    /// Abort the whole call with a timeout once this passes.
    pub deadline: Option<Deadline>,
    /// Dedicated pool size; `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
}

impl BatchOptions {
    /// Sequential, error-isolating execution without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fail the whole batch on the first query error.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Deadline::after(timeout));
        self
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run on a dedicated pool of `num_threads` workers.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }
}

/// Run `search_one` over every query, preserving input order.
///
/// A timeout anywhere fails the whole call so no partial batch escapes.
/// Other errors stay in their slot unless `fail_fast` is set.
pub(crate) fn run_batch<Q, F>(
    queries: &[Q],
    options: &BatchOptions,
    search_one: F,
) -> Result<BatchResults>
where
    Q: AsRef<[f32]> + Sync,
    F: Fn(&[f32]) -> Result<SearchResult> + Sync + Send,
{
    let run = |query: &Q| -> Result<SearchResult> {
        check_deadline(options.deadline.as_ref(), "batched search")?;
        search_one(query.as_ref())
    };

    let results: BatchResults = if options.parallel {
        match options.num_threads {
            Some(0) => {
                return Err(VantageError::invalid_parameter(
                    "num_threads must be positive",
                ));
            }
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|e| {
                        VantageError::other(format!("Failed to build search thread pool: {e}"))
                    })?;
                pool.install(|| queries.par_iter().map(run).collect())
            }
            None => queries.par_iter().map(run).collect(),
        }
    } else {
        queries.iter().map(run).collect()
    };

    if results
        .iter()
        .any(|result| matches!(result, Err(e) if e.is_timeout()))
    {
        return Err(VantageError::timeout(format!(
            "batched search of {} queries exceeded its deadline",
            queries.len()
        )));
    }

    if options.fail_fast {
        let results: Vec<SearchResult> = results.into_iter().collect::<Result<_>>()?;
        return Ok(results.into_iter().map(Ok).collect());
    }

    Ok(results)
}
