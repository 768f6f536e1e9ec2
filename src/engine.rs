//! The cost engine.
//!
//! [`CostEngine::compute`] loads everything one job needs from the source
//! tables, runs the pure calculation and turns the result into aggregates
//! ready to be stored. It never writes; storing is the caller's job.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::calculation::{
    BusinessCalendar, CostRules, ExchangeRateResolver, SystemWage, WageRateResolver,
    calculate_job_cost,
};
use crate::config::{ConfigLoader, FallbackPolicy};
use crate::error::CostResult;
use crate::models::{CostComputation, JobCostAggregate, TimeEntry, UserJobCostAggregate};
use crate::ports::{ExchangeRateSource, TimeEntrySource, WageRateSource};

/// Computes job cost aggregates from the source tables.
#[derive(Clone)]
pub struct CostEngine {
    config: ConfigLoader,
    calendar: BusinessCalendar,
    entries: Arc<dyn TimeEntrySource>,
    wages: Arc<dyn WageRateSource>,
    rates: Arc<dyn ExchangeRateSource>,
}

impl CostEngine {
    /// Creates an engine reading from the given sources.
    pub fn new(
        config: ConfigLoader,
        entries: Arc<dyn TimeEntrySource>,
        wages: Arc<dyn WageRateSource>,
        rates: Arc<dyn ExchangeRateSource>,
    ) -> Self {
        let calendar = BusinessCalendar::from_config(&config.config().calendar);
        Self {
            config,
            calendar,
            entries,
            wages,
            rates,
        }
    }

    /// The configuration the engine runs with.
    pub fn config(&self) -> &ConfigLoader {
        &self.config
    }

    /// Recomputes the aggregates of one job from scratch.
    ///
    /// The result is deterministic for a given state of the source tables,
    /// apart from `computed_at`. A job without non-void entries yields a
    /// computation with `job == None`, which deletes its aggregates when
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CostError::MissingRate`] when a wage or
    /// exchange rate cannot be resolved, and store errors from the sources.
    pub async fn compute(&self, job_key: &str) -> CostResult<CostComputation> {
        let started = Instant::now();
        let computed_at = Utc::now();

        let entries: Vec<TimeEntry> = self
            .entries
            .entries_for_job(job_key)
            .await?
            .into_iter()
            .filter(|e| e.counts_toward(job_key))
            .collect();

        if entries.is_empty() {
            debug!(job_key = %job_key, "Job has no entries, aggregates will be removed");
            return Ok(CostComputation {
                job_key: job_key.to_string(),
                job: None,
                users: Vec::new(),
                warnings: Vec::new(),
                computed_at,
            });
        }

        let wages = self.wage_resolver(&entries).await?;
        let exchange = self.exchange_resolver(&wages).await?;
        let costing = &self.config.config().costing;
        let rules = CostRules {
            wages: &wages,
            exchange: &exchange,
            calendar: &self.calendar,
            multipliers: &self.config.config().buckets,
            reporting_currency: &costing.reporting_currency,
        };

        let breakdown = calculate_job_cost(job_key, &entries, &rules)?;

        for warning in &breakdown.warnings {
            warn!(
                job_key = %job_key,
                entry_id = %warning.entry_id,
                employee_id = %warning.employee_id,
                reason = %warning.reason,
                "Skipped part of a time entry"
            );
        }

        let currency = costing.reporting_currency.clone();
        let job = breakdown.job.map(|job| JobCostAggregate {
            job_key: job_key.to_string(),
            currency: currency.clone(),
            breakdown: job,
            updated_at: computed_at,
        });
        let users: Vec<UserJobCostAggregate> = breakdown
            .users
            .into_iter()
            .map(|(employee_id, user)| UserJobCostAggregate {
                job_key: job_key.to_string(),
                employee_id,
                currency: currency.clone(),
                breakdown: user,
                updated_at: computed_at,
            })
            .collect();

        debug!(
            job_key = %job_key,
            entries = entries.len(),
            users = users.len(),
            warnings = breakdown.warnings.len(),
            duration_us = started.elapsed().as_micros(),
            "Computed job cost"
        );

        Ok(CostComputation {
            job_key: job_key.to_string(),
            job,
            users,
            warnings: breakdown.warnings,
            computed_at,
        })
    }

    async fn wage_resolver(&self, entries: &[TimeEntry]) -> CostResult<WageRateResolver> {
        let employee_ids: Vec<String> = entries
            .iter()
            .map(|e| e.employee_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows = self.wages.rates_for_employees(&employee_ids).await?;

        let costing = &self.config.config().costing;
        let fallback = &costing.wage_fallback;
        let average = match fallback.policy {
            FallbackPolicy::Average => {
                let average = self
                    .wages
                    .average_monthly(&fallback.currency, costing.wage_month_hours)
                    .await?
                    .filter(|avg| *avg > Decimal::ZERO);
                if average.is_none() {
                    warn!(
                        currency = %fallback.currency,
                        monthly_amount = %fallback.monthly_amount,
                        "No wages to average for the fallback, using the configured amount"
                    );
                }
                average
            }
            FallbackPolicy::Configured | FallbackPolicy::Disabled => None,
        };

        Ok(WageRateResolver::new(
            rows,
            SystemWage::from_config(fallback, average),
            costing.wage_month_hours,
        ))
    }

    async fn exchange_resolver(
        &self,
        wages: &WageRateResolver,
    ) -> CostResult<ExchangeRateResolver> {
        let reporting = &self.config.config().costing.reporting_currency;
        let mut rows = Vec::new();
        for currency in wages.currencies() {
            if &currency != reporting {
                rows.extend(self.rates.rates_between(&currency, reporting).await?);
            }
        }
        Ok(ExchangeRateResolver::new(rows))
    }
}
