//! In-memory backends.
//!
//! Everything lives behind `tokio::sync` locks inside the process. These
//! backends serve tests, benchmarks and the `cost-worker` binary, and can be
//! switched offline to exercise failure paths.

mod cost_store;
mod mutations;
mod source_tables;

pub use cost_store::InMemoryCostStore;
pub use mutations::TimeEntryMutations;
pub use source_tables::{Dataset, InMemorySourceTables};
