//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading the engine
//! configuration from YAML files and checking it before use.

use std::fs;
use std::path::Path;

use chrono::{Duration, FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{CostError, CostResult};
use crate::models::Bucket;

use super::types::{
    BucketMultipliers, CalendarConfig, CostConfig, CostingConfig, FallbackPolicy, QueueConfig,
};

/// `buckets.yaml` wraps the table in a `multipliers` key.
#[derive(Debug, Deserialize)]
struct BucketsFile {
    multipliers: BucketMultipliers,
}

/// Loads, validates and provides access to the engine configuration.
///
/// # Example
///
/// ```no_run
/// use job_cost_engine::config::ConfigLoader;
/// use job_cost_engine::models::Bucket;
///
/// let loader = ConfigLoader::load("./config/costing")?;
/// println!("After-hours multiplier: {}", loader.multiplier(Bucket::AfterHours));
/// # Ok::<(), job_cost_engine::error::CostError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: CostConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// Returns an error if any file is missing (`ConfigNotFound`), contains
    /// invalid YAML (`ConfigParseError`) or holds an unusable value
    /// (`InvalidConfig`).
    pub fn load<P: AsRef<Path>>(path: P) -> CostResult<Self> {
        let path = path.as_ref();

        let costing = Self::load_yaml::<CostingConfig>(&path.join("costing.yaml"))?;
        let buckets = Self::load_yaml::<BucketsFile>(&path.join("buckets.yaml"))?;
        let calendar = Self::load_yaml::<CalendarConfig>(&path.join("calendar.yaml"))?;
        let queue = Self::load_yaml::<QueueConfig>(&path.join("queue.yaml"))?;

        Self::from_config(CostConfig {
            costing,
            buckets: buckets.multipliers,
            calendar,
            queue,
        })
    }

    /// Wraps an already built configuration after validating it.
    pub fn from_config(config: CostConfig) -> CostResult<Self> {
        validate(&config)?;
        Ok(Self { config })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> CostResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| CostError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| CostError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &CostConfig {
        &self.config
    }

    /// Returns the table multiplier for a bucket.
    pub fn multiplier(&self, bucket: Bucket) -> Decimal {
        self.config.buckets.get(bucket)
    }

    /// Returns the business time zone as a fixed UTC offset.
    pub fn business_offset(&self) -> FixedOffset {
        business_offset(&self.config.calendar)
    }

    /// Returns the claim timeout as a chrono duration.
    pub fn claim_timeout(&self) -> Duration {
        claim_timeout(&self.config.queue)
    }
}

pub(crate) fn business_offset(calendar: &CalendarConfig) -> FixedOffset {
    // validated on load; UTC keeps unvalidated configs usable
    FixedOffset::east_opt(calendar.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
}

pub(crate) fn claim_timeout(queue: &QueueConfig) -> Duration {
    seconds(queue.claim_timeout_secs)
}

pub(crate) fn retry_backoff(queue: &QueueConfig) -> Duration {
    seconds(queue.retry_backoff_secs)
}

fn seconds(secs: u64) -> Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX);
    Duration::seconds(secs.min(i64::MAX / 1000))
}

fn invalid(field: &str, message: impl Into<String>) -> CostError {
    CostError::InvalidConfig {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate(config: &CostConfig) -> CostResult<()> {
    let costing = &config.costing;
    if costing.reporting_currency.trim().is_empty() {
        return Err(invalid("reporting_currency", "must not be empty"));
    }
    if costing.wage_month_hours <= Decimal::ZERO {
        return Err(invalid("wage_month_hours", "must be positive"));
    }
    let fallback = &costing.wage_fallback;
    if fallback.policy != FallbackPolicy::Disabled && fallback.monthly_amount <= Decimal::ZERO {
        return Err(invalid("wage_fallback.monthly_amount", "must be positive"));
    }

    for bucket in Bucket::ALL {
        if config.buckets.get(bucket) <= Decimal::ZERO {
            return Err(invalid(
                &format!("multipliers.{}", bucket.label()),
                "must be positive",
            ));
        }
    }

    let calendar = &config.calendar;
    if FixedOffset::east_opt(calendar.utc_offset_minutes * 60).is_none() {
        return Err(invalid(
            "utc_offset_minutes",
            format!("{} is out of range", calendar.utc_offset_minutes),
        ));
    }
    if calendar.work_window.start >= calendar.work_window.end {
        return Err(invalid("work_window", "start must be before end"));
    }

    let queue = &config.queue;
    if queue.max_attempts == 0 {
        return Err(invalid("max_attempts", "must be at least 1"));
    }
    if queue.default_batch_size == 0 {
        return Err(invalid("default_batch_size", "must be at least 1"));
    }

    Ok(())
}
