//! Aggregate models.
//!
//! Aggregates are derived rows: they can always be recomputed from time
//! entries, wage rates and exchange rates, and are never edited by hand.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Bucket;

/// Hours and costs split by bucket.
///
/// Hours and costs always carry an entry for every [`Bucket`], zero when no
/// time landed in it, so readers see a stable shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Hours worked per bucket.
    pub hours: BTreeMap<Bucket, Decimal>,
    /// Cost per bucket in the reporting currency.
    pub costs: BTreeMap<Bucket, Decimal>,
    /// Cost per native wage currency, before conversion.
    pub native_costs: BTreeMap<String, Decimal>,
    /// Sum of the bucket costs.
    pub total_cost: Decimal,
}

impl CostBreakdown {
    /// A breakdown with zero hours and cost in every bucket.
    pub fn zero() -> Self {
        let zeros: BTreeMap<Bucket, Decimal> =
            Bucket::ALL.iter().map(|b| (*b, Decimal::ZERO)).collect();
        Self {
            hours: zeros.clone(),
            costs: zeros,
            native_costs: BTreeMap::new(),
            total_cost: Decimal::ZERO,
        }
    }

    /// Hours in one bucket.
    pub fn hours_in(&self, bucket: Bucket) -> Decimal {
        self.hours.get(&bucket).copied().unwrap_or(Decimal::ZERO)
    }

    /// Reporting-currency cost in one bucket.
    pub fn cost_in(&self, bucket: Bucket) -> Decimal {
        self.costs.get(&bucket).copied().unwrap_or(Decimal::ZERO)
    }

    /// Total hours across all buckets.
    pub fn total_hours(&self) -> Decimal {
        self.hours.values().copied().sum()
    }
}

/// Labor cost of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCostAggregate {
    /// The job this aggregate summarises.
    pub job_key: String,
    /// The reporting currency of `breakdown.costs` and `breakdown.total_cost`.
    pub currency: String,
    /// Hours and costs by bucket.
    #[serde(flatten)]
    pub breakdown: CostBreakdown,
    /// When the aggregate was last recomputed.
    pub updated_at: DateTime<Utc>,
}

/// One employee's contribution to the labor cost of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJobCostAggregate {
    /// The job this aggregate belongs to.
    pub job_key: String,
    /// The employee whose time is summarised.
    pub employee_id: String,
    /// The reporting currency of `breakdown.costs` and `breakdown.total_cost`.
    pub currency: String,
    /// Hours and costs by bucket.
    #[serde(flatten)]
    pub breakdown: CostBreakdown,
    /// When the aggregate was last recomputed.
    pub updated_at: DateTime<Utc>,
}
