//! Table classification
//!
//! Partitions desired tables against the recorded state into altered,
//! created, dropped and unchanged tables and builds a migration unit for each
//! of the first three.

use crate::migration::{MigrationUnit, Operation, OperationSequence, UnitKind};
use crate::schema::{CurrentState, Table};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::columns::ColumnDiffer;

/// Result of classifying one run, keyed by table name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedTables {
    pub altered: BTreeMap<String, MigrationUnit>,
    pub created: BTreeMap<String, MigrationUnit>,
    pub dropped: BTreeMap<String, MigrationUnit>,
    /// Present on both sides with an empty delta; no unit is emitted
    pub unchanged: BTreeSet<String>,
}

/// Table names per class, for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    pub altered: Vec<String>,
    pub created: Vec<String>,
    pub dropped: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ClassificationSummary {
    pub fn total_changes(&self) -> usize {
        self.altered.len() + self.created.len() + self.dropped.len()
    }
}

impl ClassifiedTables {
    /// Number of emitted units
    pub fn len(&self) -> usize {
        self.altered.len() + self.created.len() + self.dropped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> ClassificationSummary {
        ClassificationSummary {
            altered: self.altered.keys().cloned().collect(),
            created: self.created.keys().cloned().collect(),
            dropped: self.dropped.keys().cloned().collect(),
            unchanged: self.unchanged.iter().cloned().collect(),
        }
    }

    /// Disjoint union of every emitted unit
    pub fn into_units(self) -> BTreeMap<String, MigrationUnit> {
        let mut units = self.altered;
        units.extend(self.created);
        units.extend(self.dropped);
        units
    }
}

/// Table classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct TableClassifier {
    differ: ColumnDiffer,
}

impl TableClassifier {
    pub fn new(differ: ColumnDiffer) -> Self {
        Self { differ }
    }

    /// Classify `desired` against `current`. The snapshot is not modified;
    /// matched tables are removed from a working copy so whatever is left
    /// over is dropped.
    pub fn classify(&self, current: &CurrentState, desired: &[Table]) -> ClassifiedTables {
        let mut remaining = current.to_map();
        let mut classified = ClassifiedTables::default();

        for table in desired {
            match remaining.remove(&table.name) {
                Some(old) => {
                    let delta = self.differ.diff(&old, &table.fields, true);
                    if delta.is_empty() {
                        classified.unchanged.insert(table.name.clone());
                        continue;
                    }
                    classified.altered.insert(
                        table.name.clone(),
                        MigrationUnit::new(
                            table.name.clone(),
                            UnitKind::Altered,
                            delta.upgrade,
                            delta.downgrade,
                        ),
                    );
                }
                None => {
                    let delta = self.differ.diff(&[], &table.fields, false);
                    classified.created.insert(
                        table.name.clone(),
                        MigrationUnit::new(
                            table.name.clone(),
                            UnitKind::Created,
                            delta.upgrade.then(Operation::CreateTable),
                            OperationSequence::new().then(Operation::DropTable),
                        ),
                    );
                }
            }
        }

        for (name, fields) in remaining {
            let delta = self.differ.diff(&fields, &[], true);
            classified.dropped.insert(
                name.clone(),
                MigrationUnit::new(
                    name,
                    UnitKind::Dropped,
                    OperationSequence::new().then(Operation::DropTable),
                    delta.downgrade.then(Operation::CreateTable),
                ),
            );
        }

        classified
    }
}
