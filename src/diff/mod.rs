//! Schema diff engine
//!
//! Compares the recorded column layout against the desired tables and turns
//! every difference into a reversible migration unit.

mod classifier;
mod columns;

pub use classifier::{ClassificationSummary, ClassifiedTables, TableClassifier};
pub use columns::{ColumnDelta, ColumnDiffer, DiffOptions};
