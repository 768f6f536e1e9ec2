//! Job cost calculation.
//!
//! [`calculate_job_cost`] turns the time entries of one job into bucketed
//! hours and costs, per job and per employee. It is pure: all rates come in
//! through resolvers built from a snapshot of the source tables.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::BucketMultipliers;
use crate::error::MissingRateError;
use crate::models::{
    Bucket, CostBreakdown, EntryKind, PartialEntryWarning, SkipReason, TimeEntry,
};

use super::exchange_rate::ExchangeRateResolver;
use super::timer_split::BusinessCalendar;
use super::wage_rate::WageRateResolver;

/// Decimal places hours and money are stored with.
pub const STORED_DECIMAL_PLACES: u32 = 2;

/// Rounds a stored value half away from zero.
///
/// # Example
///
/// ```
/// use job_cost_engine::calculation::round_stored;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_stored(Decimal::new(12345, 3)), Decimal::new(1235, 2));
/// assert_eq!(round_stored(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
/// ```
pub fn round_stored(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(STORED_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Everything the calculation needs besides the entries themselves.
#[derive(Debug, Clone, Copy)]
pub struct CostRules<'a> {
    /// Wage lookup.
    pub wages: &'a WageRateResolver,
    /// Currency conversion.
    pub exchange: &'a ExchangeRateResolver,
    /// Timer splitting.
    pub calendar: &'a BusinessCalendar,
    /// Bucket multiplier table.
    pub multipliers: &'a BucketMultipliers,
    /// Currency all costs are reported in.
    pub reporting_currency: &'a str,
}

/// Rounded breakdowns of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCostBreakdown {
    /// The job total, `None` if no non-void entry belongs to the job.
    pub job: Option<CostBreakdown>,
    /// Per-employee breakdowns keyed by employee id.
    pub users: BTreeMap<String, CostBreakdown>,
    /// Contributions that were skipped.
    pub warnings: Vec<PartialEntryWarning>,
}

/// Unrounded running sums.
#[derive(Debug, Default)]
struct Accumulator {
    hours: BTreeMap<Bucket, Decimal>,
    costs: BTreeMap<Bucket, Decimal>,
    native_costs: BTreeMap<String, Decimal>,
}

impl Accumulator {
    fn add(&mut self, priced: &PricedSegment) {
        *self.hours.entry(priced.bucket).or_default() += priced.hours;
        *self.costs.entry(priced.bucket).or_default() += priced.reporting_cost;
        *self
            .native_costs
            .entry(priced.currency.clone())
            .or_default() += priced.native_cost;
    }

    fn finish(self) -> CostBreakdown {
        let mut breakdown = CostBreakdown::zero();
        for (bucket, hours) in self.hours {
            breakdown.hours.insert(bucket, round_stored(hours));
        }
        for (bucket, cost) in self.costs {
            breakdown.costs.insert(bucket, round_stored(cost));
        }
        breakdown.native_costs = self
            .native_costs
            .into_iter()
            .map(|(currency, cost)| (currency, round_stored(cost)))
            .collect();
        breakdown.total_cost = breakdown.costs.values().copied().sum();
        breakdown
    }
}

#[derive(Debug)]
struct PricedSegment {
    bucket: Bucket,
    hours: Decimal,
    currency: String,
    native_cost: Decimal,
    reporting_cost: Decimal,
}

/// Calculates the labor cost of one job.
///
/// Entries that are void or booked against another job are ignored. Each
/// remaining entry is expanded into `(date, bucket, hours)` segments, and
/// each segment is priced as `hourly wage * hours * multiplier`, then
/// converted into the reporting currency with the rate of the segment date.
///
/// Sums are kept unrounded and rounded once at the end, so the job totals
/// are rounded independently of the per-employee totals and may differ from
/// their sum by rounding only.
///
/// # Errors
///
/// Returns [`MissingRateError`] if a wage or exchange rate cannot be
/// resolved for any segment. Problems local to one entry are reported as
/// warnings instead, and the entry's contribution is skipped.
pub fn calculate_job_cost(
    job_key: &str,
    entries: &[TimeEntry],
    rules: &CostRules<'_>,
) -> Result<JobCostBreakdown, MissingRateError> {
    let mut job: Option<Accumulator> = None;
    let mut users: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut warnings = Vec::new();

    for entry in entries.iter().filter(|e| e.counts_toward(job_key)) {
        let job_acc = job.get_or_insert_with(Accumulator::default);
        let user_acc = users.entry(entry.employee_id.clone()).or_default();

        let segments = match expand(entry, rules.calendar) {
            Ok(segments) => segments,
            Err(reason) => {
                warnings.push(warning(entry, entry_date(entry, rules.calendar), reason));
                continue;
            }
        };

        for (date, bucket, hours) in segments {
            match price(entry, date, bucket, hours, rules)? {
                Ok(priced) => {
                    job_acc.add(&priced);
                    user_acc.add(&priced);
                }
                Err(reason) => warnings.push(warning(entry, date, reason)),
            }
        }
    }

    Ok(JobCostBreakdown {
        job: job.map(Accumulator::finish),
        users: users
            .into_iter()
            .map(|(employee_id, acc)| (employee_id, acc.finish()))
            .collect(),
        warnings,
    })
}

/// Splits an entry into priced-per-bucket pieces.
fn expand(
    entry: &TimeEntry,
    calendar: &BusinessCalendar,
) -> Result<Vec<(NaiveDate, Bucket, Decimal)>, SkipReason> {
    match &entry.kind {
        EntryKind::Manual {
            date,
            hours,
            bucket,
        } => {
            if *hours <= Decimal::ZERO {
                return Err(SkipReason::NonPositiveHours { hours: *hours });
            }
            Ok(vec![(*date, *bucket, *hours)])
        }
        EntryKind::Timer { start, finish } => {
            let finish = finish.ok_or(SkipReason::RunningTimer)?;
            if finish <= *start {
                return Err(SkipReason::EmptySpan);
            }
            Ok(calendar
                .split(*start, finish)
                .into_iter()
                .map(|s| (s.date, s.bucket, s.hours()))
                .collect())
        }
    }
}

/// Prices one segment. The outer error aborts the job, the inner one skips
/// the segment.
fn price(
    entry: &TimeEntry,
    date: NaiveDate,
    bucket: Bucket,
    hours: Decimal,
    rules: &CostRules<'_>,
) -> Result<Result<PricedSegment, SkipReason>, MissingRateError> {
    let wage = rules.wages.resolve(&entry.employee_id, date)?;
    if wage.hourly_rate <= Decimal::ZERO {
        return Ok(Err(SkipReason::NonPositiveWage {
            hourly_rate: wage.hourly_rate,
        }));
    }

    let rate = rules
        .exchange
        .resolve(&wage.currency, rules.reporting_currency, date)?;
    if rate <= Decimal::ZERO {
        return Ok(Err(SkipReason::ZeroExchangeRate {
            from: wage.currency,
            to: rules.reporting_currency.to_string(),
        }));
    }

    let native_cost = wage.hourly_rate * hours * wage.multiplier(bucket, rules.multipliers);
    Ok(Ok(PricedSegment {
        bucket,
        hours,
        reporting_cost: native_cost * rate,
        native_cost,
        currency: wage.currency,
    }))
}

fn entry_date(entry: &TimeEntry, calendar: &BusinessCalendar) -> NaiveDate {
    match &entry.kind {
        EntryKind::Manual { date, .. } => *date,
        EntryKind::Timer { start, .. } => calendar.local_date(*start),
    }
}

fn warning(entry: &TimeEntry, date: NaiveDate, reason: SkipReason) -> PartialEntryWarning {
    PartialEntryWarning {
        entry_id: entry.id.clone(),
        employee_id: entry.employee_id.clone(),
        date: Some(date),
        reason,
    }
}
