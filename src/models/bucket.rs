//! Overtime / shift buckets.
//!
//! Every hour of labor lands in exactly one bucket, and every bucket carries
//! a cost multiplier from configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An overtime or shift classification with a fixed cost multiplier.
///
/// # Example
///
/// ```
/// use job_cost_engine::models::Bucket;
///
/// assert_eq!(Bucket::AfterHours.label(), "after_hours");
/// assert_eq!(Bucket::ALL.len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Weekday work inside the business work window.
    Regular,
    /// Weekday work outside the work window, and all of Saturday.
    AfterHours,
    /// Sundays and public holidays.
    Holiday,
}

impl Bucket {
    /// All buckets, in reporting order.
    pub const ALL: [Bucket; 3] = [Bucket::Regular, Bucket::AfterHours, Bucket::Holiday];

    /// The stable label used in aggregates and configuration.
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Regular => "regular",
            Bucket::AfterHours => "after_hours",
            Bucket::Holiday => "holiday",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
