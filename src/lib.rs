//! Incremental labor-cost aggregation for manufacturing jobs.
//!
//! Time booked against a job is priced with the employee's effective-dated
//! wage, weighted by bucket (regular, after hours, holiday) and converted into
//! one reporting currency. Results are kept as per-job and per-employee
//! aggregates that are recomputed in the background whenever their inputs
//! change:
//!
//! 1. A change to a time entry, wage rate or exchange rate enqueues the
//!    affected job keys ([`hooks`]).
//! 2. Workers claim dirty jobs and recompute them from scratch ([`worker`],
//!    [`engine`], [`calculation`]).
//! 3. The aggregates are replaced and the claim released in one step
//!    ([`ports::CostLedger`]).

#![warn(missing_docs)]

pub mod adapters;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod models;
pub mod ports;
pub mod worker;
