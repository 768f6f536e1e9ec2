//! Queue draining.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::CostEngine;
use crate::error::CostResult;
use crate::models::{ClaimedJob, JobOutcome, ReleaseOutcome};
use crate::ports::CostLedger;

/// A job that could not be recomputed during a drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    /// The job that failed.
    pub job_key: String,
    /// Why it failed.
    pub error: String,
    /// What the queue did with it.
    pub outcome: Option<ReleaseOutcome>,
}

/// Counters of one or more drain cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    /// Jobs claimed.
    pub claimed: usize,
    /// Jobs whose aggregates were written.
    pub succeeded: usize,
    /// Jobs whose recomputation failed.
    pub failed: usize,
    /// Failed jobs that reached the retry ceiling.
    pub dead_lettered: usize,
    /// Succeeded jobs that were mutated meanwhile and are pending again.
    pub requeued: usize,
    /// Jobs whose claim expired before the result was stored.
    pub stale: usize,
    /// Skipped entry contributions across all succeeded jobs.
    pub warnings: usize,
    /// Details of every failed job.
    pub failures: Vec<JobFailure>,
}

impl DrainSummary {
    /// Adds the counters of another cycle.
    pub fn absorb(&mut self, other: DrainSummary) {
        self.claimed += other.claimed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.dead_lettered += other.dead_lettered;
        self.requeued += other.requeued;
        self.stale += other.stale;
        self.warnings += other.warnings;
        self.failures.extend(other.failures);
    }
}

/// Claims dirty jobs and recomputes them.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use job_cost_engine::adapters::in_memory::{InMemoryCostStore, InMemorySourceTables};
/// use job_cost_engine::config::{ConfigLoader, CostConfig};
/// use job_cost_engine::engine::CostEngine;
/// use job_cost_engine::worker::QueueDrainWorker;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = ConfigLoader::from_config(CostConfig::default()).unwrap();
/// let tables = Arc::new(InMemorySourceTables::new());
/// let store = Arc::new(InMemoryCostStore::new(&config.config().queue));
/// let engine = Arc::new(CostEngine::new(config, tables.clone(), tables.clone(), tables));
///
/// let worker = QueueDrainWorker::new("worker-1", engine, store);
///
/// // an empty queue is not an error
/// let summary = worker.drain(100).await.unwrap();
/// assert_eq!(summary.claimed, 0);
/// # }
/// ```
pub struct QueueDrainWorker {
    worker_id: String,
    engine: Arc<CostEngine>,
    ledger: Arc<dyn CostLedger>,
    backlog_alert_depth: usize,
}

impl QueueDrainWorker {
    /// Creates a worker. The id shows up in claims and logs.
    pub fn new(
        worker_id: impl Into<String>,
        engine: Arc<CostEngine>,
        ledger: Arc<dyn CostLedger>,
    ) -> Self {
        let backlog_alert_depth = engine.config().config().queue.backlog_alert_depth;
        Self {
            worker_id: worker_id.into(),
            engine,
            ledger,
            backlog_alert_depth,
        }
    }

    /// The id of this worker.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Runs one claim cycle: claims up to `batch_size` jobs and processes them.
    ///
    /// A failing job never stops the batch. Only a failure to claim is
    /// returned as an error.
    pub async fn drain(&self, batch_size: usize) -> CostResult<DrainSummary> {
        let drain_id = Uuid::new_v4();
        let started = Instant::now();

        let claimed = self.ledger.claim_batch(&self.worker_id, batch_size).await?;
        let mut summary = DrainSummary {
            claimed: claimed.len(),
            ..DrainSummary::default()
        };
        if claimed.is_empty() {
            debug!(drain_id = %drain_id, worker_id = %self.worker_id, "Queue is empty");
            return Ok(summary);
        }

        for claim in &claimed {
            self.process(drain_id, claim, &mut summary).await;
        }

        info!(
            drain_id = %drain_id,
            worker_id = %self.worker_id,
            claimed = summary.claimed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            dead_lettered = summary.dead_lettered,
            requeued = summary.requeued,
            stale = summary.stale,
            warnings = summary.warnings,
            duration_us = started.elapsed().as_micros(),
            "Drain cycle completed"
        );

        self.check_backlog(drain_id).await;
        Ok(summary)
    }

    /// Runs claim cycles until the queue has nothing claimable left, or
    /// until `max_jobs` jobs have been claimed.
    pub async fn drain_until_empty(
        &self,
        batch_size: usize,
        max_jobs: Option<usize>,
    ) -> CostResult<DrainSummary> {
        let batch_size = batch_size.max(1);
        let mut total = DrainSummary::default();

        loop {
            let size = match max_jobs {
                Some(max) if total.claimed >= max => break,
                Some(max) => batch_size.min(max - total.claimed),
                None => batch_size,
            };

            let cycle = self.drain(size).await?;
            let done = cycle.claimed == 0;
            total.absorb(cycle);
            if done {
                break;
            }
        }

        Ok(total)
    }

    async fn process(&self, drain_id: Uuid, claim: &ClaimedJob, summary: &mut DrainSummary) {
        let started = Instant::now();

        let failure = match self.engine.compute(&claim.job_key).await {
            Ok(computation) => {
                let warnings = computation.warnings.len();
                match self.ledger.commit(claim, &computation).await {
                    Ok(outcome) => {
                        self.record_commit(drain_id, claim, outcome, warnings, summary);
                        debug!(
                            drain_id = %drain_id,
                            job_key = %claim.job_key,
                            outcome = ?outcome,
                            duration_us = started.elapsed().as_micros(),
                            "Job recomputed"
                        );
                        return;
                    }
                    Err(err) => err,
                }
            }
            Err(err) => err,
        };

        summary.failed += 1;
        let reason = failure.to_string();
        let outcome = match self
            .ledger
            .release(claim, JobOutcome::Failed(reason.clone()))
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(release_err) => {
                // the claim will expire and the job will be picked up again
                error!(
                    drain_id = %drain_id,
                    job_key = %claim.job_key,
                    error = %release_err,
                    "Failed to release job"
                );
                None
            }
        };

        if let Some(ReleaseOutcome::DeadLettered { attempts }) = outcome {
            summary.dead_lettered += 1;
            error!(
                drain_id = %drain_id,
                job_key = %claim.job_key,
                attempts = attempts,
                error = %reason,
                "Job dead-lettered"
            );
        } else {
            warn!(
                drain_id = %drain_id,
                job_key = %claim.job_key,
                attempts = claim.attempts + 1,
                missing_rate = failure.is_missing_rate(),
                error = %reason,
                "Job recomputation failed"
            );
        }

        summary.failures.push(JobFailure {
            job_key: claim.job_key.clone(),
            error: reason,
            outcome,
        });
    }

    fn record_commit(
        &self,
        drain_id: Uuid,
        claim: &ClaimedJob,
        outcome: ReleaseOutcome,
        warnings: usize,
        summary: &mut DrainSummary,
    ) {
        match outcome {
            ReleaseOutcome::Deleted => {
                summary.succeeded += 1;
                summary.warnings += warnings;
            }
            ReleaseOutcome::Requeued => {
                summary.succeeded += 1;
                summary.requeued += 1;
                summary.warnings += warnings;
            }
            ReleaseOutcome::Stale => {
                summary.stale += 1;
                warn!(
                    drain_id = %drain_id,
                    job_key = %claim.job_key,
                    worker_id = %self.worker_id,
                    "Claim expired before the result was stored"
                );
            }
            ReleaseOutcome::Retrying { .. } | ReleaseOutcome::DeadLettered { .. } => {
                summary.stale += 1;
                warn!(
                    drain_id = %drain_id,
                    job_key = %claim.job_key,
                    outcome = ?outcome,
                    "Unexpected release outcome for a successful job"
                );
            }
        }
    }

    async fn check_backlog(&self, drain_id: Uuid) {
        match self.ledger.depth().await {
            Ok(depth) if depth.outstanding() > self.backlog_alert_depth => {
                warn!(
                    drain_id = %drain_id,
                    pending = depth.pending,
                    claimed = depth.claimed,
                    dead = depth.dead,
                    threshold = self.backlog_alert_depth,
                    "Recalculation backlog above alert depth"
                );
            }
            Ok(depth) => {
                debug!(
                    drain_id = %drain_id,
                    pending = depth.pending,
                    claimed = depth.claimed,
                    dead = depth.dead,
                    "Queue depth"
                );
            }
            Err(err) => {
                warn!(drain_id = %drain_id, error = %err, "Failed to read queue depth");
            }
        }
    }
}
