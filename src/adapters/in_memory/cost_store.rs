//! In-memory recalculation queue and aggregate store.
//!
//! The queue and the aggregates share one lock, so [`CostLedger::commit`]
//! replaces a job's aggregates and releases its claim in a single step.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{QueueConfig, claim_timeout, retry_backoff};
use crate::error::{CostError, CostResult};
use crate::models::{
    Claim, ClaimedJob, CostComputation, DeadLetterJob, EnqueueOutcome, JobCostAggregate,
    JobOutcome, QueueDepth, QueueStatus, RecalcQueueEntry, ReleaseOutcome, UserJobCostAggregate,
};
use crate::ports::{AggregateStore, CostLedger, RecalcQueue};

#[derive(Debug, Default)]
struct LedgerState {
    queue: HashMap<String, RecalcQueueEntry>,
    jobs: BTreeMap<String, JobCostAggregate>,
    users: BTreeMap<(String, String), UserJobCostAggregate>,
}

/// Queue settings the store enforces.
#[derive(Debug, Clone, Copy)]
struct QueuePolicy {
    max_attempts: u32,
    claim_timeout: Duration,
    retry_backoff: Duration,
}

impl LedgerState {
    fn enqueue(&mut self, job_key: &str, now: DateTime<Utc>) -> EnqueueOutcome {
        let Some(entry) = self.queue.get_mut(job_key) else {
            self.queue
                .insert(job_key.to_string(), RecalcQueueEntry::pending(job_key, now));
            return EnqueueOutcome::Created;
        };

        match entry.status {
            QueueStatus::Pending => EnqueueOutcome::AlreadyPending,
            QueueStatus::Claimed => {
                entry.requeue_requested = true;
                EnqueueOutcome::RequeueRequested
            }
            QueueStatus::Dead => {
                *entry = RecalcQueueEntry::pending(job_key, now);
                EnqueueOutcome::Revived
            }
        }
    }

    /// Returns abandoned claims to pending, counting each as a failed attempt.
    fn expire_claims(&mut self, now: DateTime<Utc>, policy: QueuePolicy) {
        for entry in self.queue.values_mut() {
            let Some(claim) = &entry.claim else {
                continue;
            };
            // a deadline beyond the representable range never expires
            let expired = claim
                .claimed_at
                .checked_add_signed(policy.claim_timeout)
                .is_some_and(|deadline| deadline <= now);
            if entry.status != QueueStatus::Claimed || !expired {
                continue;
            }

            let message = format!("claim by worker '{}' timed out", claim.worker_id);
            warn!(
                job_key = %entry.job_key,
                worker_id = %claim.worker_id,
                "Claim timed out, returning job to the queue"
            );
            fail(entry, message, now, policy, Duration::zero());
        }
    }

    fn claim(
        &mut self,
        worker_id: &str,
        max_jobs: usize,
        now: DateTime<Utc>,
    ) -> Vec<ClaimedJob> {
        let mut candidates: Vec<&mut RecalcQueueEntry> = self
            .queue
            .values_mut()
            .filter(|e| e.is_claimable(now))
            .collect();
        candidates.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.job_key.cmp(&b.job_key))
        });

        candidates
            .into_iter()
            .take(max_jobs)
            .map(|entry| {
                let token = Uuid::new_v4();
                entry.status = QueueStatus::Claimed;
                entry.claim = Some(Claim {
                    token,
                    worker_id: worker_id.to_string(),
                    claimed_at: now,
                });
                ClaimedJob {
                    job_key: entry.job_key.clone(),
                    token,
                    attempts: entry.attempts,
                }
            })
            .collect()
    }

    fn holds_claim(&self, claim: &ClaimedJob) -> bool {
        self.queue.get(&claim.job_key).is_some_and(|entry| {
            entry.status == QueueStatus::Claimed
                && entry.claim.as_ref().is_some_and(|c| c.token == claim.token)
        })
    }

    fn release(
        &mut self,
        claim: &ClaimedJob,
        outcome: JobOutcome,
        now: DateTime<Utc>,
        policy: QueuePolicy,
    ) -> ReleaseOutcome {
        if !self.holds_claim(claim) {
            return ReleaseOutcome::Stale;
        }
        let Some(entry) = self.queue.get_mut(&claim.job_key) else {
            return ReleaseOutcome::Stale;
        };

        match outcome {
            JobOutcome::Succeeded if entry.requeue_requested => {
                let enqueued_at = entry.enqueued_at;
                *entry = RecalcQueueEntry::pending(claim.job_key.clone(), now);
                entry.enqueued_at = enqueued_at;
                ReleaseOutcome::Requeued
            }
            JobOutcome::Succeeded => {
                self.queue.remove(&claim.job_key);
                ReleaseOutcome::Deleted
            }
            JobOutcome::Failed(reason) => fail(entry, reason, now, policy, policy.retry_backoff),
        }
    }

    fn replace(&mut self, computation: &CostComputation) {
        let job_key = computation.job_key.as_str();
        self.delete(job_key);

        let Some(job) = &computation.job else {
            return;
        };
        self.jobs.insert(job_key.to_string(), job.clone());
        for user in &computation.users {
            self.users.insert(
                (user.job_key.clone(), user.employee_id.clone()),
                user.clone(),
            );
        }
    }

    fn delete(&mut self, job_key: &str) -> bool {
        let had_job = self.jobs.remove(job_key).is_some();
        let before = self.users.len();
        self.users.retain(|(job, _), _| job != job_key);
        had_job || self.users.len() != before
    }
}

fn fail(
    entry: &mut RecalcQueueEntry,
    reason: String,
    now: DateTime<Utc>,
    policy: QueuePolicy,
    backoff: Duration,
) -> ReleaseOutcome {
    entry.attempts += 1;
    entry.last_error = Some(reason);
    entry.claim = None;
    entry.requeue_requested = false;

    if entry.attempts >= policy.max_attempts {
        entry.status = QueueStatus::Dead;
        ReleaseOutcome::DeadLettered {
            attempts: entry.attempts,
        }
    } else {
        entry.status = QueueStatus::Pending;
        entry.available_at = now
            .checked_add_signed(backoff)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        ReleaseOutcome::Retrying {
            attempts: entry.attempts,
        }
    }
}

/// Recalculation queue and aggregate tables held in memory.
///
/// # Example
///
/// ```
/// use job_cost_engine::adapters::in_memory::InMemoryCostStore;
/// use job_cost_engine::config::CostConfig;
/// use job_cost_engine::models::{EnqueueOutcome, JobOutcome, ReleaseOutcome};
/// use job_cost_engine::ports::RecalcQueue;
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = InMemoryCostStore::new(&CostConfig::default().queue);
///
/// assert_eq!(store.enqueue("J-1").await.unwrap(), EnqueueOutcome::Created);
/// assert_eq!(store.enqueue("J-1").await.unwrap(), EnqueueOutcome::AlreadyPending);
///
/// let claimed = store.claim_batch("worker-1", 10).await.unwrap();
/// let outcome = store.release(&claimed[0], JobOutcome::Succeeded).await.unwrap();
/// assert_eq!(outcome, ReleaseOutcome::Deleted);
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryCostStore {
    state: Mutex<LedgerState>,
    policy: QueuePolicy,
    offline: AtomicBool,
}

impl InMemoryCostStore {
    /// An empty store enforcing the given queue settings.
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            policy: QueuePolicy {
                max_attempts: config.max_attempts.max(1),
                claim_timeout: claim_timeout(config),
                retry_backoff: retry_backoff(config),
            },
            offline: AtomicBool::new(false),
        }
    }

    /// Makes every operation fail with a store error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> CostResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CostError::store("cost store offline"));
        }
        Ok(())
    }

    /// A snapshot of the queue entry of a job.
    pub async fn queue_entry(&self, job_key: &str) -> Option<RecalcQueueEntry> {
        self.state.lock().await.queue.get(job_key).cloned()
    }

    /// All stored job aggregates.
    pub async fn all_jobs(&self) -> Vec<JobCostAggregate> {
        self.state.lock().await.jobs.values().cloned().collect()
    }
}

#[async_trait]
impl RecalcQueue for InMemoryCostStore {
    async fn enqueue(&self, job_key: &str) -> CostResult<EnqueueOutcome> {
        self.check_online()?;
        let outcome = self.state.lock().await.enqueue(job_key, Utc::now());
        debug!(job_key = %job_key, outcome = ?outcome, "Enqueued job");
        Ok(outcome)
    }

    async fn claim_batch(&self, worker_id: &str, max_jobs: usize) -> CostResult<Vec<ClaimedJob>> {
        self.check_online()?;
        if max_jobs == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut state = self.state.lock().await;
        state.expire_claims(now, self.policy);
        Ok(state.claim(worker_id, max_jobs, now))
    }

    async fn release(
        &self,
        claim: &ClaimedJob,
        outcome: JobOutcome,
    ) -> CostResult<ReleaseOutcome> {
        self.check_online()?;
        let result = self
            .state
            .lock()
            .await
            .release(claim, outcome, Utc::now(), self.policy);
        Ok(result)
    }

    async fn depth(&self) -> CostResult<QueueDepth> {
        self.check_online()?;
        let state = self.state.lock().await;

        let mut depth = QueueDepth::default();
        for entry in state.queue.values() {
            match entry.status {
                QueueStatus::Pending => {
                    depth.pending += 1;
                    depth.oldest_pending_at = Some(
                        depth
                            .oldest_pending_at
                            .map_or(entry.enqueued_at, |oldest| oldest.min(entry.enqueued_at)),
                    );
                }
                QueueStatus::Claimed => depth.claimed += 1,
                QueueStatus::Dead => depth.dead += 1,
            }
        }
        Ok(depth)
    }

    async fn dead_letters(&self) -> CostResult<Vec<DeadLetterJob>> {
        self.check_online()?;
        let state = self.state.lock().await;

        let mut dead: Vec<DeadLetterJob> = state
            .queue
            .values()
            .filter(|e| e.status == QueueStatus::Dead)
            .map(|e| DeadLetterJob {
                job_key: e.job_key.clone(),
                attempts: e.attempts,
                last_error: e.last_error.clone(),
                enqueued_at: e.enqueued_at,
            })
            .collect();
        dead.sort_by(|a, b| a.job_key.cmp(&b.job_key));
        Ok(dead)
    }

    async fn retry_dead(&self, job_key: &str) -> CostResult<bool> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        match state.queue.get_mut(job_key) {
            Some(entry) if entry.status == QueueStatus::Dead => {
                *entry = RecalcQueueEntry::pending(job_key, Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, job_key: &str) -> CostResult<bool> {
        self.check_online()?;
        Ok(self.state.lock().await.queue.remove(job_key).is_some())
    }
}

#[async_trait]
impl AggregateStore for InMemoryCostStore {
    async fn upsert_job(&self, aggregate: JobCostAggregate) -> CostResult<()> {
        self.check_online()?;
        self.state
            .lock()
            .await
            .jobs
            .insert(aggregate.job_key.clone(), aggregate);
        Ok(())
    }

    async fn upsert_user(&self, aggregate: UserJobCostAggregate) -> CostResult<()> {
        self.check_online()?;
        self.state.lock().await.users.insert(
            (aggregate.job_key.clone(), aggregate.employee_id.clone()),
            aggregate,
        );
        Ok(())
    }

    async fn get_job(&self, job_key: &str) -> CostResult<Option<JobCostAggregate>> {
        self.check_online()?;
        Ok(self.state.lock().await.jobs.get(job_key).cloned())
    }

    async fn get_user(
        &self,
        job_key: &str,
        employee_id: &str,
    ) -> CostResult<Option<UserJobCostAggregate>> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .await
            .users
            .get(&(job_key.to_string(), employee_id.to_string()))
            .cloned())
    }

    async fn users_for_job(&self, job_key: &str) -> CostResult<Vec<UserJobCostAggregate>> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .await
            .users
            .iter()
            .filter(|((job, _), _)| job == job_key)
            .map(|(_, user)| user.clone())
            .collect())
    }

    async fn list_jobs(&self, offset: usize, limit: usize) -> CostResult<Vec<JobCostAggregate>> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .await
            .jobs
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_job(&self, job_key: &str) -> CostResult<bool> {
        self.check_online()?;
        Ok(self.state.lock().await.delete(job_key))
    }

    async fn replace_job(&self, computation: &CostComputation) -> CostResult<()> {
        self.check_online()?;
        self.state.lock().await.replace(computation);
        Ok(())
    }
}

#[async_trait]
impl CostLedger for InMemoryCostStore {
    async fn commit(
        &self,
        claim: &ClaimedJob,
        computation: &CostComputation,
    ) -> CostResult<ReleaseOutcome> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        // a claim taken over by another worker must not overwrite its result
        if !state.holds_claim(claim) {
            return Ok(ReleaseOutcome::Stale);
        }
        state.replace(computation);
        Ok(state.release(claim, JobOutcome::Succeeded, Utc::now(), self.policy))
    }
}
