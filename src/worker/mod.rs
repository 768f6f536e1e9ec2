//! Background processing of the recalculation queue.
//!
//! [`QueueDrainWorker`] claims dirty jobs and recomputes them. Any number of
//! workers may drain one queue concurrently; the claim is the only point
//! where they synchronise. [`Maintenance`] holds the operator actions around
//! the queue.

mod drain;
mod maintenance;

pub use drain::{DrainSummary, JobFailure, QueueDrainWorker};
pub use maintenance::{Maintenance, QueueHealth, RecomputeSummary, StopSignal};
