//! Batch aggregation
//!
//! Collects every unit generated in one run under a shared batch number and
//! builds the umbrella migration that applies or reverts them together.

mod aggregator;

pub use aggregator::{BatchAggregator, BatchPlan, Invocation, MigrationFiles};
