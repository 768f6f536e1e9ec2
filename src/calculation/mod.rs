//! Cost calculation logic.
//!
//! This module contains the pure parts of the engine: wage and exchange rate
//! resolution, splitting timers over the business calendar, and pricing the
//! time entries of a job into bucketed aggregates. Nothing here performs I/O;
//! see [`crate::engine`] for loading the inputs.

mod exchange_rate;
mod job_cost;
mod timer_split;
mod wage_rate;

pub use exchange_rate::ExchangeRateResolver;
pub use job_cost::{
    CostRules, JobCostBreakdown, STORED_DECIMAL_PLACES, calculate_job_cost, round_stored,
};
pub use timer_split::{BusinessCalendar, TimeSegment};
pub use wage_rate::{ResolvedWage, SystemWage, WageRateResolver, WageSource};
