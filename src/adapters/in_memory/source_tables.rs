//! In-memory source tables: time entries, wage rates and exchange rates.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{CostError, CostResult};
use crate::models::{ExchangeRate, TimeEntry, WageRate, validate_wage_history};
use crate::ports::{ExchangeRateSource, TimeEntrySource, WageRateSource};

/// The contents of all source tables, as loaded from a YAML or JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Booked time.
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
    /// Effective-dated wages.
    #[serde(default)]
    pub wage_rates: Vec<WageRate>,
    /// Posted exchange rates.
    #[serde(default)]
    pub exchange_rates: Vec<ExchangeRate>,
}

/// Source tables held in memory.
#[derive(Debug, Default)]
pub struct InMemorySourceTables {
    entries: RwLock<BTreeMap<String, TimeEntry>>,
    wages: RwLock<Vec<WageRate>>,
    rates: RwLock<Vec<ExchangeRate>>,
    offline: AtomicBool,
}

impl InMemorySourceTables {
    /// Empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables pre-filled with a dataset.
    ///
    /// Fails with [`CostError::OverlappingWageRates`] if an employee's wage
    /// history is inconsistent.
    pub fn from_dataset(dataset: Dataset) -> CostResult<Self> {
        validate_wage_history(&dataset.wage_rates)?;
        let entries = dataset
            .time_entries
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        Ok(Self {
            entries: RwLock::new(entries),
            wages: RwLock::new(dataset.wage_rates),
            rates: RwLock::new(dataset.exchange_rates),
            offline: AtomicBool::new(false),
        })
    }

    /// Makes every read fail with a store error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self, table: &str) -> CostResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CostError::store(format!("{} table offline", table)));
        }
        Ok(())
    }

    /// Looks up an entry by id.
    pub async fn entry(&self, id: &str) -> Option<TimeEntry> {
        self.entries.read().await.get(id).cloned()
    }

    /// Inserts or replaces an entry, returning the previous version.
    pub async fn upsert_entry(&self, entry: TimeEntry) -> Option<TimeEntry> {
        self.entries.write().await.insert(entry.id.clone(), entry)
    }

    /// Removes an entry, returning it.
    pub async fn remove_entry(&self, id: &str) -> Option<TimeEntry> {
        self.entries.write().await.remove(id)
    }

    /// Adds a wage row, rejecting it if it overlaps the employee's history.
    pub async fn add_wage_rate(&self, rate: WageRate) -> CostResult<()> {
        let mut wages = self.wages.write().await;
        let mut candidate = wages.clone();
        candidate.push(rate);
        validate_wage_history(&candidate)?;
        *wages = candidate;
        Ok(())
    }

    /// Adds a posted exchange rate.
    pub async fn add_exchange_rate(&self, rate: ExchangeRate) {
        self.rates.write().await.push(rate);
    }

    async fn job_keys_matching<F>(&self, predicate: F) -> CostResult<Vec<String>>
    where
        F: Fn(&TimeEntry) -> bool + Send,
    {
        self.check_online("time entry")?;
        let keys: BTreeSet<String> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| predicate(e))
            .map(|e| e.job_key.clone())
            .collect();
        Ok(keys.into_iter().collect())
    }
}

#[async_trait]
impl TimeEntrySource for InMemorySourceTables {
    async fn entries_for_job(&self, job_key: &str) -> CostResult<Vec<TimeEntry>> {
        self.check_online("time entry")?;
        Ok(self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.job_key == job_key)
            .cloned()
            .collect())
    }

    async fn job_keys(&self) -> CostResult<Vec<String>> {
        self.job_keys_matching(|_| true).await
    }

    async fn job_keys_for_employee_since(
        &self,
        employee_id: &str,
        from: NaiveDate,
        offset: FixedOffset,
    ) -> CostResult<Vec<String>> {
        self.job_keys_matching(|e| {
            e.employee_id == employee_id && e.touches_on_or_after(from, offset)
        })
        .await
    }

    async fn job_keys_for_employees_since(
        &self,
        employee_ids: &[String],
        from: NaiveDate,
        offset: FixedOffset,
    ) -> CostResult<Vec<String>> {
        let employees: BTreeSet<&str> = employee_ids.iter().map(String::as_str).collect();
        self.job_keys_matching(|e| {
            employees.contains(e.employee_id.as_str()) && e.touches_on_or_after(from, offset)
        })
        .await
    }

    async fn job_keys_since(
        &self,
        from: NaiveDate,
        offset: FixedOffset,
    ) -> CostResult<Vec<String>> {
        self.job_keys_matching(|e| e.touches_on_or_after(from, offset))
            .await
    }
}

#[async_trait]
impl WageRateSource for InMemorySourceTables {
    async fn rates_for_employees(&self, employee_ids: &[String]) -> CostResult<Vec<WageRate>> {
        self.check_online("wage rate")?;
        Ok(self
            .wages
            .read()
            .await
            .iter()
            .filter(|r| employee_ids.contains(&r.employee_id))
            .cloned()
            .collect())
    }

    async fn average_monthly(
        &self,
        currency: &str,
        month_hours: Decimal,
    ) -> CostResult<Option<Decimal>> {
        self.check_online("wage rate")?;
        let wages = self.wages.read().await;
        let amounts: Vec<Decimal> = wages
            .iter()
            .filter(|r| r.currency == currency)
            .map(|r| r.monthly_equivalent(month_hours))
            .collect();

        if amounts.is_empty() {
            return Ok(None);
        }
        let sum: Decimal = amounts.iter().copied().sum();
        Ok(Some(sum / Decimal::from(amounts.len())))
    }

    async fn employees_paid_in(&self, currency: &str) -> CostResult<Vec<String>> {
        self.check_online("wage rate")?;
        let employees: BTreeSet<String> = self
            .wages
            .read()
            .await
            .iter()
            .filter(|r| r.currency == currency)
            .map(|r| r.employee_id.clone())
            .collect();
        Ok(employees.into_iter().collect())
    }
}

#[async_trait]
impl ExchangeRateSource for InMemorySourceTables {
    async fn rates_between(&self, a: &str, b: &str) -> CostResult<Vec<ExchangeRate>> {
        self.check_online("exchange rate")?;
        Ok(self
            .rates
            .read()
            .await
            .iter()
            .filter(|r| (r.from == a && r.to == b) || (r.from == b && r.to == a))
            .cloned()
            .collect())
    }
}
