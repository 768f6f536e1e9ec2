//! Recalculation queue models.
//!
//! These types describe the state of the dirty-job queue and the results of
//! operations on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Handed to exactly one worker.
    Claimed,
    /// Exceeded the retry ceiling; parked for manual review.
    Dead,
}

/// An exclusive hold on a queue entry by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Token the worker must present when releasing the entry.
    pub token: Uuid,
    /// The worker holding the claim.
    pub worker_id: String,
    /// When the claim was taken.
    pub claimed_at: DateTime<Utc>,
}

/// A job key waiting for (or undergoing) recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcQueueEntry {
    /// The job whose aggregates are stale.
    pub job_key: String,
    /// When the job was first marked dirty.
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time a pending entry may be claimed.
    pub available_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: QueueStatus,
    /// Number of failed recomputation attempts.
    pub attempts: u32,
    /// The error of the most recent failed attempt.
    pub last_error: Option<String>,
    /// The active claim while `status` is `Claimed`.
    pub claim: Option<Claim>,
    /// A mutation arrived while the entry was claimed.
    pub requeue_requested: bool,
}

impl RecalcQueueEntry {
    /// Returns true if the entry is pending and its backoff has passed.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Pending && self.available_at <= now
    }

    /// A fresh pending entry.
    pub fn pending(job_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_key: job_key.into(),
            enqueued_at: now,
            available_at: now,
            status: QueueStatus::Pending,
            attempts: 0,
            last_error: None,
            claim: None,
            requeue_requested: false,
        }
    }
}

/// A job key handed to a worker by `claim_batch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    /// The job to recompute.
    pub job_key: String,
    /// Token proving ownership of the claim.
    pub token: Uuid,
    /// Failed attempts before this claim.
    pub attempts: u32,
}

/// Result of enqueueing a job key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// A new pending entry was created.
    Created,
    /// A pending entry already existed; nothing changed.
    AlreadyPending,
    /// The entry is being processed; it will be processed again afterwards.
    RequeueRequested,
    /// A dead entry was returned to pending with a fresh retry budget.
    Revived,
}

/// How a claimed job finished, as reported by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Aggregates were written.
    Succeeded,
    /// Recomputation failed with the given reason.
    Failed(String),
}

/// Result of releasing a claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReleaseOutcome {
    /// The entry was removed from the queue.
    Deleted,
    /// The job succeeded but was mutated meanwhile; it is pending again.
    Requeued,
    /// The job failed and will be retried.
    Retrying {
        /// Failed attempts so far.
        attempts: u32,
    },
    /// The job failed too often and is parked.
    DeadLettered {
        /// Failed attempts so far.
        attempts: u32,
    },
    /// The claim had expired or was taken over; nothing changed.
    Stale,
}

/// Queue depth counters, the health signal for observability tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    /// Entries waiting to be claimed.
    pub pending: usize,
    /// Entries currently claimed by workers.
    pub claimed: usize,
    /// Entries parked for manual review.
    pub dead: usize,
    /// Enqueue time of the oldest pending entry.
    pub oldest_pending_at: Option<DateTime<Utc>>,
}

impl QueueDepth {
    /// Entries still expected to be processed automatically.
    pub fn outstanding(&self) -> usize {
        self.pending + self.claimed
    }
}

/// A job key removed from automatic retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterJob {
    /// The job that keeps failing.
    pub job_key: String,
    /// Number of failed attempts.
    pub attempts: u32,
    /// The error of the last attempt.
    pub last_error: Option<String>,
    /// When the job was first marked dirty.
    pub enqueued_at: DateTime<Utc>,
}
