//! Exchange rate resolution.
//!
//! Rates are posted on business days only, so a lookup carries the most
//! recent prior rate forward. The inverse pair is used when the direct pair
//! was never posted.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::MissingRateError;
use crate::models::ExchangeRate;

type Series = BTreeMap<NaiveDate, Decimal>;

/// Resolves the conversion rate between two currencies on a date.
///
/// # Example
///
/// ```
/// use job_cost_engine::calculation::ExchangeRateResolver;
/// use job_cost_engine::models::ExchangeRate;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let resolver = ExchangeRateResolver::new(vec![ExchangeRate {
///     from: "TRY".to_string(),
///     to: "EUR".to_string(),
///     date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
///     rate: Decimal::new(25, 3),
/// }]);
///
/// // Saturday uses Friday's rate
/// let saturday = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap();
/// assert_eq!(resolver.resolve("TRY", "EUR", saturday).unwrap(), Decimal::new(25, 3));
/// assert_eq!(resolver.resolve("EUR", "EUR", saturday).unwrap(), Decimal::ONE);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExchangeRateResolver {
    series: HashMap<(String, String), Series>,
}

impl ExchangeRateResolver {
    /// Builds a resolver over the given posted rates.
    ///
    /// When a pair is posted twice for one date the later row wins.
    pub fn new(rates: impl IntoIterator<Item = ExchangeRate>) -> Self {
        let mut series: HashMap<(String, String), Series> = HashMap::new();
        for rate in rates {
            series
                .entry((rate.from, rate.to))
                .or_default()
                .insert(rate.date, rate.rate);
        }
        Self { series }
    }

    /// Returns units of `to` per unit of `from` on `as_of`.
    ///
    /// Identity when the currencies match. Otherwise the direct pair on or
    /// before `as_of`, then the inverse of the reverse pair. A stored rate of
    /// zero is returned as zero so the caller can skip the contribution; it
    /// is never replaced by a default.
    pub fn resolve(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> Result<Decimal, MissingRateError> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        if let Some(rate) = self.latest_on_or_before(from, to, as_of) {
            return Ok(rate);
        }

        if let Some(inverse) = self.latest_on_or_before(to, from, as_of) {
            if inverse.is_zero() {
                return Ok(Decimal::ZERO);
            }
            return Ok(Decimal::ONE / inverse);
        }

        Err(MissingRateError::Exchange {
            from: from.to_string(),
            to: to.to_string(),
            date: as_of,
        })
    }

    fn latest_on_or_before(&self, from: &str, to: &str, as_of: NaiveDate) -> Option<Decimal> {
        self.series
            .get(&(from.to_string(), to.to_string()))
            .and_then(|series| series.range(..=as_of).next_back())
            .map(|(_, rate)| *rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rate(from: &str, to: &str, on: NaiveDate, value: &str) -> ExchangeRate {
        ExchangeRate {
            from: from.to_string(),
            to: to.to_string(),
            date: on,
            rate: dec(value),
        }
    }

    fn resolver() -> ExchangeRateResolver {
        ExchangeRateResolver::new(vec![
            rate("TRY", "EUR", date(2025, 1, 2), "0.027"),
            rate("TRY", "EUR", date(2025, 1, 3), "0.025"),
            rate("TRY", "EUR", date(2025, 1, 10), "0.024"),
            rate("EUR", "USD", date(2025, 1, 2), "1.25"),
        ])
    }

    #[rstest]
    #[case(date(2025, 1, 2), "0.027")]
    #[case(date(2025, 1, 3), "0.025")]
    #[case(date(2025, 1, 5), "0.025")]
    #[case(date(2025, 1, 9), "0.025")]
    #[case(date(2025, 3, 1), "0.024")]
    fn test_carries_most_recent_rate_forward(#[case] on: NaiveDate, #[case] expected: &str) {
        assert_eq!(resolver().resolve("TRY", "EUR", on).unwrap(), dec(expected));
    }

    #[test]
    fn test_identity_needs_no_rate() {
        let empty = ExchangeRateResolver::default();
        assert_eq!(empty.resolve("EUR", "EUR", date(2000, 1, 1)).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_inverse_pair_is_secondary_source() {
        let resolved = resolver().resolve("USD", "EUR", date(2025, 1, 6)).unwrap();
        assert_eq!(resolved, dec("0.8"));
    }

    #[test]
    fn test_direct_pair_wins_over_inverse() {
        let resolver = ExchangeRateResolver::new(vec![
            rate("USD", "EUR", date(2025, 1, 2), "0.9"),
            rate("EUR", "USD", date(2025, 1, 2), "1.25"),
        ]);
        assert_eq!(resolver.resolve("USD", "EUR", date(2025, 1, 2)).unwrap(), dec("0.9"));
    }

    #[test]
    fn test_date_before_first_rate_is_missing() {
        match resolver().resolve("TRY", "EUR", date(2025, 1, 1)) {
            Err(MissingRateError::Exchange { from, to, date: d }) => {
                assert_eq!(from, "TRY");
                assert_eq!(to, "EUR");
                assert_eq!(d, date(2025, 1, 1));
            }
            other => panic!("Expected MissingRateError::Exchange, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_rate_is_returned_not_defaulted() {
        let resolver = ExchangeRateResolver::new(vec![rate("TRY", "EUR", date(2025, 1, 2), "0")]);
        assert_eq!(resolver.resolve("TRY", "EUR", date(2025, 1, 2)).unwrap(), Decimal::ZERO);
        assert_eq!(resolver.resolve("EUR", "TRY", date(2025, 1, 2)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_unknown_pair_is_missing() {
        assert!(resolver().resolve("GBP", "EUR", date(2025, 1, 5)).is_err());
    }
}
