//! Bounded-concurrency run over a task plan
//!
//! Tasks run through `buffer_unordered`, so at most `concurrency` fetches are
//! in flight and results surface in completion order. The sink is written
//! from this task alone, which keeps rows whole.

use std::sync::Arc;

use credential_pool::PoolStatus;
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::sink::{ResultRow, ResultSink};
use crate::tasks::TaskPlan;

const PROGRESS_EVERY: usize = 100;

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks in the plan.
    pub total: usize,
    /// Rows written.
    pub completed: usize,
    /// Rows written as zero because the fetch failed.
    pub failed: usize,
    pub cancelled: bool,
    pub credentials: PoolStatus,
}

#[derive(Debug)]
pub struct Orchestrator {
    fetcher: Arc<Fetcher>,
    concurrency: usize,
    progress_every: usize,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<Fetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            progress_every: PROGRESS_EVERY,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Run every task in `plan`, writing one row per task to `sink`.
    ///
    /// Failed tasks are written with a count of zero. Only a sink error ends
    /// the run early with `Err`. When `cancel` fires, no new tasks start,
    /// in-flight ones are dropped (their credentials go back to the pool), and
    /// the rows written so far are flushed.
    pub async fn run(
        &self,
        plan: &TaskPlan,
        sink: &mut dyn ResultSink,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let total = plan.len();
        info!(total, concurrency = self.concurrency, "processing tasks");

        let fetcher = &*self.fetcher;
        let mut results = stream::iter(plan.iter())
            .map(move |task| fetcher.quantify_task(task))
            .buffer_unordered(self.concurrency);

        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut cancelled = false;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = results.next() => match next {
                    Some(result) => result,
                    None => break,
                },
            };

            metrics::counter!("denue_tasks_completed_total").increment(1);
            if let Some(kind) = result.failure {
                failed += 1;
                metrics::counter!("denue_task_failures_total", "kind" => kind).increment(1);
            }

            sink.write_row(&ResultRow::from(result)).await?;
            completed += 1;

            if completed % self.progress_every == 0 || completed == total {
                info!(completed, total, "progress");
            }
        }

        // Dropping the stream drops in-flight fetches and their leases.
        drop(results);
        sink.flush().await?;

        let credentials = self.fetcher.pool().status();
        if cancelled {
            warn!(completed, total, "run cancelled");
        }
        info!(
            completed,
            failed,
            total,
            credentials_active = credentials.active,
            credentials_retired = credentials.retired,
            "run finished"
        );

        Ok(RunSummary {
            total,
            completed,
            failed,
            cancelled,
            credentials,
        })
    }
}
