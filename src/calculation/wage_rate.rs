//! Wage rate resolution.
//!
//! This module provides [`WageRateResolver`], which picks the wage that applies
//! to an employee on a date from their effective-dated wage history, falling
//! back to a system-wide wage when the employee has none.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{BucketMultipliers, FallbackPolicy, WageFallbackConfig};
use crate::error::MissingRateError;
use crate::models::{Bucket, WageRate};

/// Where a resolved wage came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum WageSource {
    /// The employee's own wage row.
    Employee {
        /// Start date of the row that applied.
        effective_from: NaiveDate,
    },
    /// The system-wide fallback wage.
    Fallback,
}

/// The system-wide wage used for employees without an applicable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemWage {
    /// Monthly amount of the fallback wage.
    pub monthly_amount: Decimal,
    /// Currency of the fallback wage.
    pub currency: String,
}

impl SystemWage {
    /// Builds the fallback wage from configuration.
    ///
    /// `average_monthly` is the average monthly-equivalent amount of all wage
    /// rows paid in the fallback currency, if any exist. It is only used by
    /// [`FallbackPolicy::Average`]. Returns `None` when the fallback is disabled.
    pub fn from_config(
        config: &WageFallbackConfig,
        average_monthly: Option<Decimal>,
    ) -> Option<Self> {
        let monthly_amount = match config.policy {
            FallbackPolicy::Disabled => return None,
            FallbackPolicy::Configured => config.monthly_amount,
            FallbackPolicy::Average => average_monthly
                .filter(|avg| *avg > Decimal::ZERO)
                .unwrap_or(config.monthly_amount),
        };
        Some(Self {
            monthly_amount,
            currency: config.currency.clone(),
        })
    }
}

/// A wage ready to be applied to a segment of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWage {
    /// Hourly rate in `currency`.
    pub hourly_rate: Decimal,
    /// The currency the wage is paid in.
    pub currency: String,
    /// Where the wage came from.
    pub source: WageSource,
    /// Employee-specific after-hours multiplier.
    pub after_hours_multiplier: Option<Decimal>,
    /// Employee-specific holiday multiplier.
    pub holiday_multiplier: Option<Decimal>,
}

impl ResolvedWage {
    /// The multiplier for a bucket. Overrides on the wage row win over the table.
    pub fn multiplier(&self, bucket: Bucket, table: &BucketMultipliers) -> Decimal {
        let override_value = match bucket {
            Bucket::Regular => None,
            Bucket::AfterHours => self.after_hours_multiplier,
            Bucket::Holiday => self.holiday_multiplier,
        };
        override_value.unwrap_or_else(|| table.get(bucket))
    }
}

/// Resolves the wage of an employee on a date.
///
/// Lookups are pure: the resolver owns a snapshot of the wage rows it was
/// built from and never changes it.
///
/// # Example
///
/// ```
/// use job_cost_engine::calculation::{SystemWage, WageRateResolver, WageSource};
/// use job_cost_engine::models::{PayBasis, WageRate};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let rate = WageRate {
///     employee_id: "emp_1".to_string(),
///     amount: Decimal::new(45000, 0),
///     basis: PayBasis::Monthly,
///     currency: "TRY".to_string(),
///     effective_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
///     effective_to: None,
///     after_hours_multiplier: None,
///     holiday_multiplier: None,
/// };
/// let resolver = WageRateResolver::new(vec![rate], None, Decimal::new(225, 0));
///
/// let wage = resolver
///     .resolve("emp_1", NaiveDate::from_ymd_opt(2025, 3, 3).unwrap())
///     .unwrap();
/// assert_eq!(wage.hourly_rate, Decimal::new(200, 0));
/// assert!(matches!(wage.source, WageSource::Employee { .. }));
///
/// // no row yet and no fallback
/// assert!(resolver
///     .resolve("emp_1", NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
///     .is_err());
/// ```
#[derive(Debug, Clone)]
pub struct WageRateResolver {
    by_employee: HashMap<String, Vec<WageRate>>,
    fallback: Option<SystemWage>,
    month_hours: Decimal,
}

impl WageRateResolver {
    /// Builds a resolver over the given wage rows.
    pub fn new(
        rates: Vec<WageRate>,
        fallback: Option<SystemWage>,
        month_hours: Decimal,
    ) -> Self {
        let mut by_employee: HashMap<String, Vec<WageRate>> = HashMap::new();
        for rate in rates {
            by_employee
                .entry(rate.employee_id.clone())
                .or_default()
                .push(rate);
        }
        for rows in by_employee.values_mut() {
            rows.sort_by_key(|r| r.effective_from);
        }

        Self {
            by_employee,
            fallback,
            month_hours,
        }
    }

    /// Returns the wage that applies to `employee_id` on `as_of`.
    ///
    /// The employee's row with the latest `effective_from <= as_of` is used if
    /// it has not been closed before `as_of`. Otherwise the system-wide
    /// fallback applies, and without one the lookup fails.
    pub fn resolve(
        &self,
        employee_id: &str,
        as_of: NaiveDate,
    ) -> Result<ResolvedWage, MissingRateError> {
        // Rows are sorted ascending, so the last row that has started is the
        // one in force.
        let applicable = self
            .by_employee
            .get(employee_id)
            .and_then(|rows| rows.iter().rfind(|r| r.effective_from <= as_of))
            .filter(|r| r.is_current_on(as_of));

        if let Some(row) = applicable {
            return Ok(ResolvedWage {
                hourly_rate: row.hourly_rate(self.month_hours),
                currency: row.currency.clone(),
                source: WageSource::Employee {
                    effective_from: row.effective_from,
                },
                after_hours_multiplier: row.after_hours_multiplier,
                holiday_multiplier: row.holiday_multiplier,
            });
        }

        match &self.fallback {
            Some(system) => Ok(ResolvedWage {
                hourly_rate: system.monthly_amount / self.month_hours,
                currency: system.currency.clone(),
                source: WageSource::Fallback,
                after_hours_multiplier: None,
                holiday_multiplier: None,
            }),
            None => Err(MissingRateError::Wage {
                employee_id: employee_id.to_string(),
                date: as_of,
            }),
        }
    }

    /// Currencies any resolution can produce, fallback included.
    pub fn currencies(&self) -> Vec<String> {
        let mut currencies: Vec<String> = self
            .by_employee
            .values()
            .flatten()
            .map(|r| r.currency.clone())
            .chain(self.fallback.iter().map(|f| f.currency.clone()))
            .collect();
        currencies.sort();
        currencies.dedup();
        currencies
    }
}
