//! Per-table migration unit

use crate::schema::Field;
use serde::{Deserialize, Serialize};

use super::naming::{normalize_identifier, unit_identifier};
use super::operation::{OperationSequence, SimulationError};

/// How a table was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Exists on both sides with a non-empty column delta
    Altered,
    /// Desired only
    Created,
    /// Current only
    Dropped,
}

/// Named upgrade/downgrade pair for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationUnit {
    /// Table the operations apply to, as given
    pub table: String,
    /// Identifier-safe name
    pub name: String,
    pub kind: UnitKind,
    pub upgrade: OperationSequence,
    pub downgrade: OperationSequence,
}

impl MigrationUnit {
    pub fn new(
        table: impl Into<String>,
        kind: UnitKind,
        upgrade: OperationSequence,
        downgrade: OperationSequence,
    ) -> Self {
        let table = table.into();
        Self {
            name: normalize_identifier(&table),
            table,
            kind,
            upgrade,
            downgrade,
        }
    }

    /// Identifier of this unit within `batch`
    pub fn identifier(&self, batch: u32) -> String {
        unit_identifier(batch, &self.name)
    }

    /// Run upgrade then downgrade against `before` and check the original
    /// column set comes back. Returns the upgraded layout.
    pub fn verify_round_trip(
        &self,
        before: Option<&[Field]>,
    ) -> Result<Option<Vec<Field>>, SimulationError> {
        let original = before.map(<[Field]>::to_vec);
        let upgraded = self.upgrade.apply(original.clone())?;
        let restored = self.downgrade.apply(upgraded.clone())?;

        if !same_columns(original.as_deref(), restored.as_deref()) {
            return Err(SimulationError::RoundTrip(self.table.clone()));
        }
        Ok(upgraded)
    }
}

/// Column sets are equal regardless of position
pub(crate) fn same_columns(a: Option<&[Field]>, b: Option<&[Field]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            let mut a: Vec<_> = a.iter().collect();
            let mut b: Vec<_> = b.iter().collect();
            a.sort_by(|x, y| x.name.cmp(&y.name));
            b.sort_by(|x, y| x.name.cmp(&y.name));
            a == b
        }
        _ => false,
    }
}
