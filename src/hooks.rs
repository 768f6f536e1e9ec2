//! Triggers that mark jobs dirty when their inputs change.
//!
//! Time entry changes enqueue the touched job directly. Wage and exchange
//! rate changes can affect many jobs, so they enqueue every job with work
//! on or after the business-local date the change takes effect.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use tracing::{debug, info};

use crate::config::{CostConfig, FallbackPolicy, WageFallbackConfig, business_offset};
use crate::error::CostResult;
use crate::models::EnqueueOutcome;
use crate::ports::{RecalcQueue, TimeEntrySource, WageRateSource};

/// Enqueues jobs affected by changes to the source tables.
#[derive(Clone)]
pub struct RecalcTrigger {
    queue: Arc<dyn RecalcQueue>,
    entries: Arc<dyn TimeEntrySource>,
    wages: Arc<dyn WageRateSource>,
    fallback: WageFallbackConfig,
    offset: FixedOffset,
}

impl RecalcTrigger {
    /// Creates a trigger.
    ///
    /// The wage fallback of `config` decides which changes can affect
    /// fallback-priced work; its calendar decides which day a timer falls on.
    pub fn new(
        queue: Arc<dyn RecalcQueue>,
        entries: Arc<dyn TimeEntrySource>,
        wages: Arc<dyn WageRateSource>,
        config: &CostConfig,
    ) -> Self {
        Self {
            queue,
            entries,
            wages,
            fallback: config.costing.wage_fallback.clone(),
            offset: business_offset(&config.calendar),
        }
    }

    /// A time entry of the job was created, updated, deleted or voided.
    pub async fn on_time_entry_changed(&self, job_key: &str) -> CostResult<EnqueueOutcome> {
        let outcome = self.queue.enqueue(job_key).await?;
        debug!(job_key = %job_key, outcome = ?outcome, "Time entry changed");
        Ok(outcome)
    }

    /// A wage row of the employee starting at `effective_from` was added or
    /// changed. Returns how many jobs were enqueued.
    ///
    /// Under the `average` fallback policy a row in the fallback currency
    /// also moves the fallback wage, which prices work on any date, so every
    /// job is enqueued.
    pub async fn on_wage_rate_changed(
        &self,
        employee_id: &str,
        effective_from: NaiveDate,
    ) -> CostResult<usize> {
        let moves_fallback = self.moves_average_fallback(employee_id).await?;
        let job_keys = if moves_fallback {
            self.entries.job_keys().await?
        } else {
            self.entries
                .job_keys_for_employee_since(employee_id, effective_from, self.offset)
                .await?
        };

        let count = self.enqueue_all(&job_keys).await?;
        info!(
            employee_id = %employee_id,
            effective_from = %effective_from,
            moves_fallback = moves_fallback,
            jobs = count,
            "Wage rate changed"
        );
        Ok(count)
    }

    /// A rate involving `currency` posted on `effective_from` was added or
    /// changed. Returns how many jobs were enqueued.
    ///
    /// Affected are jobs with work since the date by employees paid in the
    /// currency, or every job with work since the date when the currency is
    /// the fallback wage currency.
    pub async fn on_exchange_rate_changed(
        &self,
        currency: &str,
        effective_from: NaiveDate,
    ) -> CostResult<usize> {
        let job_keys = if currency == self.fallback.currency {
            self.entries
                .job_keys_since(effective_from, self.offset)
                .await?
        } else {
            let employees = self.wages.employees_paid_in(currency).await?;
            if employees.is_empty() {
                Vec::new()
            } else {
                self.entries
                    .job_keys_for_employees_since(&employees, effective_from, self.offset)
                    .await?
            }
        };

        let count = self.enqueue_all(&job_keys).await?;
        info!(
            currency = %currency,
            effective_from = %effective_from,
            jobs = count,
            "Exchange rate changed"
        );
        Ok(count)
    }

    async fn moves_average_fallback(&self, employee_id: &str) -> CostResult<bool> {
        if self.fallback.policy != FallbackPolicy::Average {
            return Ok(false);
        }
        let rows = self
            .wages
            .rates_for_employees(&[employee_id.to_string()])
            .await?;
        Ok(rows.iter().any(|r| r.currency == self.fallback.currency))
    }

    async fn enqueue_all(&self, job_keys: &[String]) -> CostResult<usize> {
        let unique: BTreeSet<&String> = job_keys.iter().collect();
        for job_key in &unique {
            self.queue.enqueue(job_key).await?;
        }
        Ok(unique.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory::{Dataset, InMemoryCostStore, InMemorySourceTables};
    use crate::config::CostConfig;
    use crate::models::{Bucket, EntryKind, PayBasis, TimeEntry, WageRate};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: &str, employee_id: &str, job_key: &str, on: NaiveDate) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            employee_id: employee_id.to_string(),
            job_key: job_key.to_string(),
            kind: EntryKind::Manual {
                date: on,
                hours: Decimal::ONE,
                bucket: Bucket::Regular,
            },
            void: false,
        }
    }

    fn wage(employee_id: &str, currency: &str) -> WageRate {
        WageRate {
            employee_id: employee_id.to_string(),
            amount: Decimal::new(45000, 0),
            basis: PayBasis::Monthly,
            currency: currency.to_string(),
            effective_from: date(2025, 1, 1),
            effective_to: None,
            after_hours_multiplier: None,
            holiday_multiplier: None,
        }
    }

    fn setup() -> (RecalcTrigger, Arc<InMemoryCostStore>) {
        setup_with(CostConfig::default())
    }

    fn setup_with(config: CostConfig) -> (RecalcTrigger, Arc<InMemoryCostStore>) {
        let tables = Arc::new(
            InMemorySourceTables::from_dataset(Dataset {
                time_entries: vec![
                    entry("te_1", "emp_try", "J-1", date(2025, 1, 15)),
                    entry("te_2", "emp_try", "J-2", date(2025, 3, 15)),
                    entry("te_3", "emp_usd", "J-3", date(2025, 3, 20)),
                    entry("te_4", "emp_usd", "J-3", date(2025, 3, 21)),
                ],
                wage_rates: vec![wage("emp_try", "TRY"), wage("emp_usd", "USD")],
                exchange_rates: vec![],
            })
            .unwrap(),
        );
        let store = Arc::new(InMemoryCostStore::new(&config.queue));
        let trigger = RecalcTrigger::new(store.clone(), tables.clone(), tables, &config);
        (trigger, store)
    }

    #[tokio::test]
    async fn test_wage_change_enqueues_jobs_since_date() {
        let (trigger, store) = setup();

        let count = trigger
            .on_wage_rate_changed("emp_try", date(2025, 3, 1))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(store.queue_entry("J-2").await.is_some());
        assert!(store.queue_entry("J-1").await.is_none());
    }

    #[tokio::test]
    async fn test_wage_change_in_average_fallback_currency_enqueues_every_job() {
        let mut config = CostConfig::default();
        config.costing.wage_fallback.policy = FallbackPolicy::Average;
        let (trigger, store) = setup_with(config);

        let count = trigger
            .on_wage_rate_changed("emp_try", date(2025, 3, 1))
            .await
            .unwrap();

        assert_eq!(count, 3);
        for job_key in ["J-1", "J-2", "J-3"] {
            assert!(store.queue_entry(job_key).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_wage_change_outside_fallback_currency_stays_narrow() {
        let mut config = CostConfig::default();
        config.costing.wage_fallback.policy = FallbackPolicy::Average;
        let (trigger, store) = setup_with(config);

        let count = trigger
            .on_wage_rate_changed("emp_usd", date(2025, 3, 21))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(store.queue_entry("J-3").await.is_some());
        assert!(store.queue_entry("J-2").await.is_none());
    }

    #[tokio::test]
    async fn test_rate_change_in_wage_currency_enqueues_its_employees() {
        let (trigger, store) = setup();

        let count = trigger
            .on_exchange_rate_changed("USD", date(2025, 1, 1))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(store.queue_entry("J-3").await.is_some());
    }

    #[tokio::test]
    async fn test_rate_change_in_fallback_currency_enqueues_every_job_since_date() {
        let (trigger, store) = setup();

        let count = trigger
            .on_exchange_rate_changed("TRY", date(2025, 3, 1))
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert!(store.queue_entry("J-2").await.is_some());
        assert!(store.queue_entry("J-3").await.is_some());
    }

    #[tokio::test]
    async fn test_rate_change_in_unused_currency_enqueues_nothing() {
        let (trigger, _store) = setup();

        let count = trigger
            .on_exchange_rate_changed("GBP", date(2025, 1, 1))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_time_entry_change_enqueues_job() {
        let (trigger, _store) = setup();

        assert_eq!(
            trigger.on_time_entry_changed("J-1").await.unwrap(),
            EnqueueOutcome::Created
        );
        assert_eq!(
            trigger.on_time_entry_changed("J-1").await.unwrap(),
            EnqueueOutcome::AlreadyPending
        );
    }
}
