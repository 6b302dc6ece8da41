//! Reversible, batched schema-migration generation
//!
//! Given the desired tables and the last known column layout, the engine
//! classifies every table as created, altered, dropped or unchanged, derives
//! an upgrade and an inverse downgrade per table, renders each as a
//! self-contained migration and ties them together under one numbered batch.
//!
//! The diff, classify, render and aggregate steps are pure. State, batch
//! numbers and output files go through the collaborators in [`providers`]
//! and [`writer`].

pub mod batch;
pub mod config;
pub mod diff;
pub mod error;
pub mod migration;
pub mod migrator;
pub mod providers;
pub mod render;
pub mod routes;
pub mod schema;
pub mod state;
pub mod writer;

pub use batch::{BatchAggregator, MigrationFiles};
pub use diff::{ColumnDiffer, DiffOptions, TableClassifier};
pub use error::MigratorError;
pub use migrator::{AutoMigrator, GenerationOutcome};
pub use schema::{CurrentState, Field, Table};
