//! Operator actions around the recalculation queue.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::engine::CostEngine;
use crate::error::CostResult;
use crate::models::{CostComputation, DeadLetterJob, QueueDepth};
use crate::ports::{CostLedger, TimeEntrySource};

const AGGREGATE_PAGE_SIZE: usize = 500;

/// A cooperative stop flag for long-running maintenance.
///
/// Clones share the flag, so one clone can be handed to the task and
/// another kept to stop it.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// A signal that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the task to stop after the job it is working on.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of [`Maintenance::recompute_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    /// Jobs known to the source tables.
    pub total: usize,
    /// Jobs whose aggregates were rewritten.
    pub processed: usize,
    /// Jobs whose recomputation failed.
    pub failed: usize,
    /// The run ended early on request.
    pub stopped: bool,
}

/// Queue state as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueHealth {
    /// Queue counters.
    pub depth: QueueDepth,
    /// Outstanding jobs exceed the configured alert depth.
    pub backlogged: bool,
    /// Jobs parked after too many failures.
    pub dead_letters: Vec<DeadLetterJob>,
}

/// Maintenance operations: bulk enqueue, synchronous recompute, purge and
/// health reporting.
pub struct Maintenance {
    engine: Arc<CostEngine>,
    ledger: Arc<dyn CostLedger>,
    entries: Arc<dyn TimeEntrySource>,
}

impl Maintenance {
    /// Creates the maintenance facade.
    pub fn new(
        engine: Arc<CostEngine>,
        ledger: Arc<dyn CostLedger>,
        entries: Arc<dyn TimeEntrySource>,
    ) -> Self {
        Self {
            engine,
            ledger,
            entries,
        }
    }

    /// Enqueues every job with at least one time entry. Returns how many
    /// job keys were enqueued.
    pub async fn enqueue_all_jobs(&self) -> CostResult<usize> {
        let job_keys = self.entries.job_keys().await?;
        for job_key in &job_keys {
            self.ledger.enqueue(job_key).await?;
        }
        info!(jobs = job_keys.len(), "Enqueued all jobs");
        Ok(job_keys.len())
    }

    /// Recomputes one job immediately, bypassing the queue, and stores the
    /// result.
    ///
    /// A queue entry for the job, if any, is left alone.
    pub async fn recompute_now(&self, job_key: &str) -> CostResult<CostComputation> {
        let computation = self.engine.compute(job_key).await?;
        self.ledger.replace_job(&computation).await?;
        info!(
            job_key = %job_key,
            warnings = computation.warnings.len(),
            "Recomputed job"
        );
        Ok(computation)
    }

    /// Recomputes every job, one at a time, until done or stopped.
    ///
    /// Jobs are taken from the time entries and from the stored aggregates,
    /// so aggregates of jobs that lost all their entries are removed too.
    /// Failing jobs are logged and counted; the run continues with the next.
    pub async fn recompute_all(&self, stop: &StopSignal) -> CostResult<RecomputeSummary> {
        let started = Instant::now();
        let mut job_keys: BTreeSet<String> = self.entries.job_keys().await?.into_iter().collect();
        job_keys.extend(self.aggregated_job_keys().await?);
        let mut summary = RecomputeSummary {
            total: job_keys.len(),
            ..RecomputeSummary::default()
        };

        for job_key in &job_keys {
            if stop.is_stop_requested() {
                summary.stopped = true;
                warn!(
                    processed = summary.processed,
                    total = summary.total,
                    "Recompute stopped on request"
                );
                break;
            }

            match self.recompute_now(job_key).await {
                Ok(_) => summary.processed += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(job_key = %job_key, error = %err, "Recompute failed");
                }
            }
        }

        info!(
            total = summary.total,
            processed = summary.processed,
            failed = summary.failed,
            stopped = summary.stopped,
            duration_us = started.elapsed().as_micros(),
            "Recompute finished"
        );
        Ok(summary)
    }

    async fn aggregated_job_keys(&self) -> CostResult<Vec<String>> {
        let mut job_keys = Vec::new();
        loop {
            let page = self
                .ledger
                .list_jobs(job_keys.len(), AGGREGATE_PAGE_SIZE)
                .await?;
            let done = page.len() < AGGREGATE_PAGE_SIZE;
            job_keys.extend(page.into_iter().map(|job| job.job_key));
            if done {
                return Ok(job_keys);
            }
        }
    }

    /// Removes a job's aggregates and queue entry. Returns true if anything
    /// was removed.
    pub async fn purge_job(&self, job_key: &str) -> CostResult<bool> {
        let removed_entry = self.ledger.remove(job_key).await?;
        let removed_aggregates = self.ledger.delete_job(job_key).await?;
        info!(
            job_key = %job_key,
            removed_entry = removed_entry,
            removed_aggregates = removed_aggregates,
            "Purged job"
        );
        Ok(removed_entry || removed_aggregates)
    }

    /// Current queue depth, backlog flag and dead letters.
    pub async fn queue_health(&self) -> CostResult<QueueHealth> {
        let depth = self.ledger.depth().await?;
        let dead_letters = self.ledger.dead_letters().await?;
        let threshold = self.engine.config().config().queue.backlog_alert_depth;

        Ok(QueueHealth {
            backlogged: depth.outstanding() > threshold,
            depth,
            dead_letters,
        })
    }
}
