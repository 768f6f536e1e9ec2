//! Exchange rate model.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A posted conversion rate between two currencies on one date.
///
/// `1 from = rate to`. Rates are not posted on every calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// The source currency.
    pub from: String,
    /// The target currency.
    pub to: String,
    /// The date the rate was posted for.
    pub date: NaiveDate,
    /// Units of `to` per unit of `from`.
    pub rate: Decimal,
}
