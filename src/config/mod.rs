//! Configuration loading and management for the job cost engine.
//!
//! Configuration lives in a directory of YAML files:
//!
//! ```text
//! config/costing/
//! ├── costing.yaml    # Reporting currency, monthly hours, wage fallback
//! ├── buckets.yaml    # Cost multiplier per bucket
//! ├── calendar.yaml   # UTC offset, work window, public holidays
//! └── queue.yaml      # Retry ceiling, claim timeout, backoff, batch size
//! ```
//!
//! # Example
//!
//! ```no_run
//! use job_cost_engine::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load("./config/costing").unwrap();
//! println!("Reporting in {}", loader.config().costing.reporting_currency);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub(crate) use loader::{business_offset, claim_timeout, retry_backoff};
pub use types::{
    BucketMultipliers, CalendarConfig, CostConfig, CostingConfig, FallbackPolicy, Holiday,
    QueueConfig, WageFallbackConfig, WorkWindow,
};
