//! Error types for the job cost engine.
//!
//! Errors are strongly typed with `thiserror`. Rate lookups that cannot be
//! satisfied at all are grouped under [`MissingRateError`] because they share
//! one policy: the affected job is not aggregated and stays queued.

use chrono::NaiveDate;
use thiserror::Error;

/// A wage or exchange rate that could not be resolved, even through fallbacks.
///
/// Producing a financial total with a silently wrong rate is worse than a
/// stale total, so this aborts the computation of the whole job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissingRateError {
    /// No wage rate for the employee and no usable system-wide fallback.
    #[error("No wage rate for employee '{employee_id}' on {date} and no fallback configured")]
    Wage {
        /// The employee whose rate was requested.
        employee_id: String,
        /// The date the rate was requested for.
        date: NaiveDate,
    },

    /// No exchange rate stored on or before the date, in either direction.
    #[error("No exchange rate {from}->{to} on or before {date}")]
    Exchange {
        /// The source currency.
        from: String,
        /// The target currency.
        to: String,
        /// The date the rate was requested for.
        date: NaiveDate,
    },
}

/// The main error type for the job cost engine.
///
/// # Example
///
/// ```
/// use job_cost_engine::error::CostError;
///
/// let error = CostError::ConfigNotFound {
///     path: "/missing/costing.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/costing.yaml");
/// ```
#[derive(Debug, Error)]
pub enum CostError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Configuration parsed but holds a value the engine cannot work with.
    #[error("Invalid configuration value '{field}': {message}")]
    InvalidConfig {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A required rate could not be resolved.
    #[error(transparent)]
    MissingRate(#[from] MissingRateError),

    /// Two wage rates of one employee are current on the same date.
    #[error("Wage rates for employee '{employee_id}' overlap: {first} and {second}")]
    OverlappingWageRates {
        /// The employee with the inconsistent wage history.
        employee_id: String,
        /// Effective-from date of the earlier row.
        first: NaiveDate,
        /// Effective-from date of the row that starts inside the earlier one.
        second: NaiveDate,
    },

    /// A storage backend failed.
    #[error("Store error: {message}")]
    Store {
        /// A description of the backend failure.
        message: String,
    },
}

impl CostError {
    /// Creates a store error from anything printable.
    pub fn store(message: impl Into<String>) -> Self {
        CostError::Store {
            message: message.into(),
        }
    }

    /// Returns true if the error is a missing wage or exchange rate.
    pub fn is_missing_rate(&self) -> bool {
        matches!(self, CostError::MissingRate(_))
    }
}

/// A type alias for Results that return CostError.
pub type CostResult<T> = Result<T, CostError>;
