//! Wage rate model.
//!
//! Wage history is effective-dated: each row applies from its
//! `effective_from` date until the next row of the same employee starts, or
//! until its own `effective_to` date when one is set.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CostError, CostResult};

/// Whether a wage amount is quoted per month or per hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayBasis {
    /// A monthly salary, converted with the configured monthly working hours.
    #[default]
    Monthly,
    /// An hourly rate, used as is.
    Hourly,
}

/// A wage rate for one employee, effective from a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WageRate {
    /// The employee this rate applies to.
    pub employee_id: String,
    /// The base amount, interpreted according to `basis`.
    pub amount: Decimal,
    /// Whether `amount` is monthly or hourly.
    #[serde(default)]
    pub basis: PayBasis,
    /// The currency the wage is paid in.
    pub currency: String,
    /// First date this rate applies.
    pub effective_from: NaiveDate,
    /// Last date this rate applies, if it was closed explicitly.
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    /// Employee-specific after-hours multiplier, overriding the bucket table.
    #[serde(default)]
    pub after_hours_multiplier: Option<Decimal>,
    /// Employee-specific holiday multiplier, overriding the bucket table.
    #[serde(default)]
    pub holiday_multiplier: Option<Decimal>,
}

impl WageRate {
    /// Returns true if the row has started on `date` and has not been closed before it.
    pub fn is_current_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|end| end >= date)
    }

    /// The hourly rate, dividing monthly amounts by `month_hours`.
    ///
    /// # Examples
    ///
    /// ```
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
    /// assert_eq!(rate.hourly_rate(Decimal::new(225, 0)), Decimal::new(200, 0));
    /// ```
    pub fn hourly_rate(&self, month_hours: Decimal) -> Decimal {
        match self.basis {
            PayBasis::Monthly => self.amount / month_hours,
            PayBasis::Hourly => self.amount,
        }
    }

    /// The monthly equivalent of the rate, used for system-wide averages.
    pub fn monthly_equivalent(&self, month_hours: Decimal) -> Decimal {
        match self.basis {
            PayBasis::Monthly => self.amount,
            PayBasis::Hourly => self.amount * month_hours,
        }
    }
}

/// Checks that no employee has two wage rows current on the same date.
///
/// An open-ended row is implicitly closed by the next row of the same
/// employee, so only explicit `effective_to` dates reaching into the next
/// row, or two rows starting on the same date, are rejected.
pub fn validate_wage_history(rates: &[WageRate]) -> CostResult<()> {
    let mut sorted: Vec<&WageRate> = rates.iter().collect();
    sorted.sort_by(|a, b| {
        a.employee_id
            .cmp(&b.employee_id)
            .then(a.effective_from.cmp(&b.effective_from))
    });

    for pair in sorted.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        if earlier.employee_id != later.employee_id {
            continue;
        }
        let reaches_into_later = earlier
            .effective_to
            .is_some_and(|end| end >= later.effective_from);
        if earlier.effective_from == later.effective_from || reaches_into_later {
            return Err(CostError::OverlappingWageRates {
                employee_id: later.employee_id.clone(),
                first: earlier.effective_from,
                second: later.effective_from,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rate(employee: &str, from: NaiveDate, to: Option<NaiveDate>) -> WageRate {
        WageRate {
            employee_id: employee.to_string(),
            amount: dec("45000"),
            basis: PayBasis::Monthly,
            currency: "TRY".to_string(),
            effective_from: from,
            effective_to: to,
            after_hours_multiplier: None,
            holiday_multiplier: None,
        }
    }

    #[test]
    fn test_monthly_rate_divides_by_month_hours() {
        let r = rate("emp_1", date(2025, 1, 1), None);
        assert_eq!(r.hourly_rate(dec("225")), dec("200"));
        assert_eq!(r.monthly_equivalent(dec("225")), dec("45000"));
    }

    #[test]
    fn test_hourly_rate_is_used_as_is() {
        let r = WageRate {
            amount: dec("150"),
            basis: PayBasis::Hourly,
            ..rate("emp_1", date(2025, 1, 1), None)
        };
        assert_eq!(r.hourly_rate(dec("225")), dec("150"));
        assert_eq!(r.monthly_equivalent(dec("225")), dec("33750"));
    }

    #[test]
    fn test_is_current_respects_effective_to() {
        let r = rate("emp_1", date(2025, 1, 1), Some(date(2025, 1, 31)));
        assert!(!r.is_current_on(date(2024, 12, 31)));
        assert!(r.is_current_on(date(2025, 1, 31)));
        assert!(!r.is_current_on(date(2025, 2, 1)));
    }

    #[test]
    fn test_open_ended_rows_do_not_overlap() {
        let rates = vec![
            rate("emp_1", date(2025, 1, 1), None),
            rate("emp_1", date(2025, 6, 1), None),
            rate("emp_2", date(2025, 1, 1), None),
        ];
        assert!(validate_wage_history(&rates).is_ok());
    }

    #[test]
    fn test_explicit_end_inside_next_row_is_rejected() {
        let rates = vec![
            rate("emp_1", date(2025, 6, 1), None),
            rate("emp_1", date(2025, 1, 1), Some(date(2025, 6, 1))),
        ];
        match validate_wage_history(&rates) {
            Err(CostError::OverlappingWageRates {
                employee_id,
                first,
                second,
            }) => {
                assert_eq!(employee_id, "emp_1");
                assert_eq!(first, date(2025, 1, 1));
                assert_eq!(second, date(2025, 6, 1));
            }
            other => panic!("Expected OverlappingWageRates, got {:?}", other),
        }
    }

    #[test]
    fn test_same_start_date_is_rejected() {
        let rates = vec![
            rate("emp_1", date(2025, 1, 1), None),
            rate("emp_1", date(2025, 1, 1), None),
        ];
        assert!(validate_wage_history(&rates).is_err());
    }
}
