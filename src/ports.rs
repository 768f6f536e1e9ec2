//! Storage seams of the engine.
//!
//! The engine reads time entries, wage rates and exchange rates from tables
//! owned by other components, and owns two tables of its own: the
//! recalculation queue and the cost aggregates. Each is a trait here so the
//! engine can run against any backend; [`crate::adapters::in_memory`]
//! implements all of them for tests and the worker binary.

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use rust_decimal::Decimal;

use crate::error::CostResult;
use crate::models::{
    ClaimedJob, CostComputation, DeadLetterJob, EnqueueOutcome, ExchangeRate, JobCostAggregate,
    JobOutcome, QueueDepth, ReleaseOutcome, TimeEntry, UserJobCostAggregate, WageRate,
};

/// Read access to time entries.
#[async_trait]
pub trait TimeEntrySource: Send + Sync {
    /// All entries booked against the job, void ones included.
    async fn entries_for_job(&self, job_key: &str) -> CostResult<Vec<TimeEntry>>;

    /// Every job key with at least one entry, sorted.
    async fn job_keys(&self) -> CostResult<Vec<String>>;

    /// Job keys with entries of the employee that have work on or after the
    /// business-local date `from`. Timer instants are read at `offset`.
    async fn job_keys_for_employee_since(
        &self,
        employee_id: &str,
        from: NaiveDate,
        offset: FixedOffset,
    ) -> CostResult<Vec<String>>;

    /// Job keys with entries of any of the employees that have work on or
    /// after the business-local date `from`.
    async fn job_keys_for_employees_since(
        &self,
        employee_ids: &[String],
        from: NaiveDate,
        offset: FixedOffset,
    ) -> CostResult<Vec<String>>;

    /// Job keys with any entry that has work on or after the business-local
    /// date `from`.
    async fn job_keys_since(&self, from: NaiveDate, offset: FixedOffset)
    -> CostResult<Vec<String>>;
}

/// Read access to wage rates.
#[async_trait]
pub trait WageRateSource: Send + Sync {
    /// All wage rows of the given employees.
    async fn rates_for_employees(&self, employee_ids: &[String]) -> CostResult<Vec<WageRate>>;

    /// Average monthly-equivalent amount of all wage rows paid in `currency`,
    /// or `None` if there are none.
    async fn average_monthly(
        &self,
        currency: &str,
        month_hours: Decimal,
    ) -> CostResult<Option<Decimal>>;

    /// Employees with at least one wage row paid in `currency`.
    async fn employees_paid_in(&self, currency: &str) -> CostResult<Vec<String>>;
}

/// Read access to posted exchange rates.
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    /// All rates posted for the pair, in either direction.
    async fn rates_between(&self, a: &str, b: &str) -> CostResult<Vec<ExchangeRate>>;
}

/// The durable queue of jobs whose aggregates are stale.
///
/// At most one entry exists per job key. Claims are exclusive: a job key is
/// handed to one worker at a time, and a claim that is not released within
/// the configured timeout is handed out again.
#[async_trait]
pub trait RecalcQueue: Send + Sync {
    /// Marks a job as needing recomputation.
    async fn enqueue(&self, job_key: &str) -> CostResult<EnqueueOutcome>;

    /// Claims up to `max_jobs` pending jobs, oldest first.
    ///
    /// Concurrent callers never receive the same job key. Returning fewer
    /// jobs than asked for, or none, is not an error.
    async fn claim_batch(&self, worker_id: &str, max_jobs: usize) -> CostResult<Vec<ClaimedJob>>;

    /// Reports how a claimed job finished.
    async fn release(&self, claim: &ClaimedJob, outcome: JobOutcome)
    -> CostResult<ReleaseOutcome>;

    /// Current queue counters.
    async fn depth(&self) -> CostResult<QueueDepth>;

    /// Jobs parked after too many failures.
    async fn dead_letters(&self) -> CostResult<Vec<DeadLetterJob>>;

    /// Returns a dead job to pending with a fresh retry budget.
    ///
    /// Returns false if the job is not dead-lettered.
    async fn retry_dead(&self, job_key: &str) -> CostResult<bool>;

    /// Drops the queue entry of a job regardless of its state.
    async fn remove(&self, job_key: &str) -> CostResult<bool>;
}

/// Storage of per-job and per-employee cost aggregates.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Inserts or replaces a job aggregate.
    async fn upsert_job(&self, aggregate: JobCostAggregate) -> CostResult<()>;

    /// Inserts or replaces a per-employee aggregate.
    async fn upsert_user(&self, aggregate: UserJobCostAggregate) -> CostResult<()>;

    /// The aggregate of a job, if one exists.
    async fn get_job(&self, job_key: &str) -> CostResult<Option<JobCostAggregate>>;

    /// The aggregate of one employee on one job, if one exists.
    async fn get_user(
        &self,
        job_key: &str,
        employee_id: &str,
    ) -> CostResult<Option<UserJobCostAggregate>>;

    /// All per-employee aggregates of a job, ordered by employee id.
    async fn users_for_job(&self, job_key: &str) -> CostResult<Vec<UserJobCostAggregate>>;

    /// A page of job aggregates ordered by job key.
    async fn list_jobs(&self, offset: usize, limit: usize) -> CostResult<Vec<JobCostAggregate>>;

    /// Deletes the job aggregate and all its per-employee aggregates.
    ///
    /// Returns false if there was nothing to delete.
    async fn delete_job(&self, job_key: &str) -> CostResult<bool>;

    /// Replaces everything stored for the job with the computation.
    ///
    /// Per-employee rows of employees absent from the computation are
    /// removed; a computation without a job aggregate deletes the job.
    async fn replace_job(&self, computation: &CostComputation) -> CostResult<()>;
}

/// A backend that owns both the queue and the aggregates.
///
/// `commit` writes a job's aggregates and releases its claim. Backends able
/// to do both atomically should override it; the default performs the two
/// steps in order.
#[async_trait]
pub trait CostLedger: RecalcQueue + AggregateStore {
    /// Stores the computation and releases the claim as succeeded.
    async fn commit(
        &self,
        claim: &ClaimedJob,
        computation: &CostComputation,
    ) -> CostResult<ReleaseOutcome> {
        self.replace_job(computation).await?;
        self.release(claim, JobOutcome::Succeeded).await
    }
}
