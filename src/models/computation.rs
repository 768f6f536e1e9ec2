//! Results of a job cost computation.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{JobCostAggregate, UserJobCostAggregate};

/// Why part of an entry was left out of a job's cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// The timer has no finish time yet.
    RunningTimer,
    /// The timer finishes at or before it starts.
    EmptySpan,
    /// A manual entry with zero or negative hours.
    NonPositiveHours {
        /// The hours on the entry.
        hours: Decimal,
    },
    /// The resolved wage is zero or negative.
    NonPositiveWage {
        /// The resolved hourly rate.
        hourly_rate: Decimal,
    },
    /// The stored exchange rate for the date is zero.
    ZeroExchangeRate {
        /// The wage currency.
        from: String,
        /// The reporting currency.
        to: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RunningTimer => write!(f, "timer is still running"),
            SkipReason::EmptySpan => write!(f, "timer finishes before it starts"),
            SkipReason::NonPositiveHours { hours } => write!(f, "entry has {} hours", hours),
            SkipReason::NonPositiveWage { hourly_rate } => {
                write!(f, "resolved hourly wage is {}", hourly_rate)
            }
            SkipReason::ZeroExchangeRate { from, to } => {
                write!(f, "stored exchange rate {}->{} is zero", from, to)
            }
        }
    }
}

/// A contribution skipped during computation. The job is still aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialEntryWarning {
    /// The entry whose contribution was skipped.
    pub entry_id: String,
    /// The employee who booked the entry.
    pub employee_id: String,
    /// The date of the skipped segment, when known.
    pub date: Option<NaiveDate>,
    /// Why the contribution was skipped.
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl fmt::Display for PartialEntryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => write!(f, "entry '{}' on {}: {}", self.entry_id, date, self.reason),
            None => write!(f, "entry '{}': {}", self.entry_id, self.reason),
        }
    }
}

/// Everything one computation of a job produced.
///
/// `job` is `None` when the job has no non-void entries; its aggregates are
/// then removed instead of written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostComputation {
    /// The job that was computed.
    pub job_key: String,
    /// The job-level aggregate, if the job currently has entries.
    pub job: Option<JobCostAggregate>,
    /// Per-employee aggregates, ordered by employee id.
    pub users: Vec<UserJobCostAggregate>,
    /// Skipped contributions.
    pub warnings: Vec<PartialEntryWarning>,
    /// When the computation ran; also the `updated_at` of every aggregate.
    pub computed_at: DateTime<Utc>,
}
