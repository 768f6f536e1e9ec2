//! Configuration types for cost aggregation.
//!
//! These structures are deserialized from the YAML files of a configuration
//! directory. [`CostConfig::default`] mirrors the shipped configuration.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::Bucket;

/// How a wage is chosen for an employee with no rate on or before a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// No fallback: the lookup fails with a missing rate.
    Disabled,
    /// Use the configured monthly amount.
    Configured,
    /// Use the average monthly amount of all wage rows in the fallback
    /// currency, or the configured amount when there are none.
    Average,
}

/// The system-wide wage used when an employee has no applicable rate.
#[derive(Debug, Clone, Deserialize)]
pub struct WageFallbackConfig {
    /// Which fallback to apply.
    pub policy: FallbackPolicy,
    /// The configured monthly amount.
    pub monthly_amount: Decimal,
    /// The currency of the fallback wage.
    pub currency: String,
}

/// General costing settings from `costing.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CostingConfig {
    /// The currency every aggregate is reported in.
    pub reporting_currency: String,
    /// Standard working hours in a month, used to turn monthly wages hourly.
    pub wage_month_hours: Decimal,
    /// The system-wide fallback wage.
    pub wage_fallback: WageFallbackConfig,
}

/// Cost multipliers per bucket from `buckets.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketMultipliers {
    /// Multiplier for regular hours.
    pub regular: Decimal,
    /// Multiplier for after-hours work.
    pub after_hours: Decimal,
    /// Multiplier for Sunday and holiday work.
    pub holiday: Decimal,
}

impl BucketMultipliers {
    /// The multiplier for a bucket.
    pub fn get(&self, bucket: Bucket) -> Decimal {
        match bucket {
            Bucket::Regular => self.regular,
            Bucket::AfterHours => self.after_hours,
            Bucket::Holiday => self.holiday,
        }
    }
}

/// The weekday window counted as regular hours.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkWindow {
    /// Local start of regular hours.
    pub start: NaiveTime,
    /// Local end of regular hours.
    pub end: NaiveTime,
}

/// A public holiday; all work on it is costed in the holiday bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct Holiday {
    /// The local date of the holiday.
    pub date: NaiveDate,
    /// The name of the holiday.
    pub name: String,
}

/// Business calendar from `calendar.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// Offset of business local time from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// Weekday regular-hours window.
    pub work_window: WorkWindow,
    /// Public holidays.
    #[serde(default)]
    pub holidays: Vec<Holiday>,
}

/// Queue and worker settings from `queue.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Failed attempts after which a job is dead-lettered.
    pub max_attempts: u32,
    /// Seconds after which an unreleased claim is considered abandoned.
    pub claim_timeout_secs: u64,
    /// Seconds a failed job waits before it can be claimed again.
    #[serde(default)]
    pub retry_backoff_secs: u64,
    /// Jobs claimed per batch when the caller does not say otherwise.
    pub default_batch_size: usize,
    /// Outstanding queue depth above which the backlog is reported.
    pub backlog_alert_depth: usize,
}

/// The complete engine configuration.
#[derive(Debug, Clone)]
pub struct CostConfig {
    /// General costing settings.
    pub costing: CostingConfig,
    /// Bucket multiplier table.
    pub buckets: BucketMultipliers,
    /// Business calendar.
    pub calendar: CalendarConfig,
    /// Queue settings.
    pub queue: QueueConfig,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            costing: CostingConfig {
                reporting_currency: "EUR".to_string(),
                wage_month_hours: Decimal::new(225, 0),
                wage_fallback: WageFallbackConfig {
                    policy: FallbackPolicy::Configured,
                    monthly_amount: Decimal::ONE,
                    currency: "TRY".to_string(),
                },
            },
            buckets: BucketMultipliers {
                regular: Decimal::ONE,
                after_hours: Decimal::new(15, 1),
                holiday: Decimal::new(2, 0),
            },
            calendar: CalendarConfig {
                utc_offset_minutes: 180,
                work_window: WorkWindow {
                    start: NaiveTime::from_hms_opt(7, 30, 0).unwrap_or_default(),
                    end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
                },
                holidays: Vec::new(),
            },
            queue: QueueConfig {
                max_attempts: 5,
                claim_timeout_secs: 300,
                retry_backoff_secs: 30,
                default_batch_size: 100,
                backlog_alert_depth: 1000,
            },
        }
    }
}
