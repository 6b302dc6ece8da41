//! Column-level diff for a single table

use crate::migration::{Operation, OperationSequence};
use crate::schema::Field;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Knobs for the column diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOptions {
    /// Compare full descriptors of columns present on both sides. When off,
    /// only additions and removals by name are detected.
    pub compare_attributes: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            compare_attributes: true,
        }
    }
}

/// Upgrade and downgrade sequences produced for one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDelta {
    pub upgrade: OperationSequence,
    pub downgrade: OperationSequence,
}

impl ColumnDelta {
    pub fn is_empty(&self) -> bool {
        self.upgrade.is_empty()
    }
}

/// Column differ
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnDiffer {
    options: DiffOptions,
}

impl ColumnDiffer {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DiffOptions {
        self.options
    }

    /// Diff `old` against `new`.
    ///
    /// Upgrade order is additions (in `new` order), then alterations (in `new`
    /// order), then removals (in `old` order). The downgrade is the
    /// operation-by-operation inverse of the upgrade, in the same order.
    /// Column alterations are only emitted when `table_exists`, since a table
    /// that is about to be created has nothing to alter.
    pub fn diff(&self, old: &[Field], new: &[Field], table_exists: bool) -> ColumnDelta {
        let old_cols: HashMap<&str, &Field> = old.iter().map(|f| (f.name.as_str(), f)).collect();
        let new_cols: HashMap<&str, &Field> = new.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut upgrade = OperationSequence::new();

        for field in new.iter().filter(|f| !old_cols.contains_key(f.name.as_str())) {
            upgrade.push(Operation::AddColumn {
                field: field.clone(),
            });
        }

        if self.options.compare_attributes && table_exists {
            for to in new {
                if let Some(from) = old_cols.get(to.name.as_str()) {
                    if *from != to {
                        upgrade.push(Operation::AlterColumn {
                            from: (*from).clone(),
                            to: to.clone(),
                        });
                    }
                }
            }
        }

        for field in old.iter().filter(|f| !new_cols.contains_key(f.name.as_str())) {
            upgrade.push(Operation::DropColumn {
                field: field.clone(),
            });
        }

        let downgrade = upgrade.inverse();
        ColumnDelta { upgrade, downgrade }
    }
}
