//! Core data models for the job cost engine.
//!
//! Source records ([`TimeEntry`], [`WageRate`], [`ExchangeRate`]) are owned by
//! external collaborators. Aggregates and queue entries are owned by this crate.

mod aggregate;
mod bucket;
mod computation;
mod exchange_rate;
mod queue_entry;
mod time_entry;
mod wage_rate;

pub use aggregate::{CostBreakdown, JobCostAggregate, UserJobCostAggregate};
pub use bucket::Bucket;
pub use computation::{CostComputation, PartialEntryWarning, SkipReason};
pub use exchange_rate::ExchangeRate;
pub use queue_entry::{
    Claim, ClaimedJob, DeadLetterJob, EnqueueOutcome, JobOutcome, QueueDepth, QueueStatus,
    RecalcQueueEntry, ReleaseOutcome,
};
pub use time_entry::{EntryKind, TimeEntry};
pub use wage_rate::{PayBasis, WageRate, validate_wage_history};
