//! Abstract schema operations
//!
//! An `OperationSequence` reads like a schema builder: column operations
//! issued against a table that does not exist yet accumulate until a
//! `CreateTable` finalizer materializes them; against an existing table they
//! alter it in place.

use crate::schema::Field;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single schema change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    AddColumn { field: Field },
    /// Carries the full descriptor so the inverse can recreate the column
    DropColumn { field: Field },
    AlterColumn { from: Field, to: Field },
    CreateTable,
    DropTable,
}

impl Operation {
    /// The operation that undoes this one
    pub fn inverse(&self) -> Operation {
        match self {
            Operation::AddColumn { field } => Operation::DropColumn {
                field: field.clone(),
            },
            Operation::DropColumn { field } => Operation::AddColumn {
                field: field.clone(),
            },
            Operation::AlterColumn { from, to } => Operation::AlterColumn {
                from: to.clone(),
                to: from.clone(),
            },
            Operation::CreateTable => Operation::DropTable,
            Operation::DropTable => Operation::CreateTable,
        }
    }

    /// Column touched by this operation, if any
    pub fn column(&self) -> Option<&str> {
        match self {
            Operation::AddColumn { field } | Operation::DropColumn { field } => {
                Some(field.name.as_str())
            }
            Operation::AlterColumn { to, .. } => Some(to.name.as_str()),
            Operation::CreateTable | Operation::DropTable => None,
        }
    }

    pub fn is_table_level(&self) -> bool {
        matches!(self, Operation::CreateTable | Operation::DropTable)
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        match self {
            Operation::AddColumn { field } => {
                format!("Add column {} ({})", field.name, field.data_type)
            }
            Operation::DropColumn { field } => format!("Drop column {}", field.name),
            Operation::AlterColumn { from, to } => {
                format!("Alter column {}: {} → {}", to.name, from.data_type, to.data_type)
            }
            Operation::CreateTable => "Create table".to_string(),
            Operation::DropTable => "Drop table".to_string(),
        }
    }
}

/// Why a sequence could not be applied to a column layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("column {0} already exists")]
    ColumnExists(String),

    #[error("column {0} does not exist")]
    MissingColumn(String),

    #[error("column {column} does not match the expected definition")]
    ColumnMismatch { column: String },

    #[error("table already exists")]
    TableExists,

    #[error("table does not exist")]
    MissingTable,

    #[error("columns were defined for a table that was never created")]
    UnfinishedTable,

    #[error("downgrade of {0} does not restore the original columns")]
    RoundTrip(String),
}

/// Ordered list of operations for one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationSequence(Vec<Operation>);

impl OperationSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Operation) {
        self.0.push(op);
    }

    /// Append a finalizer, builder style
    pub fn then(mut self, op: Operation) -> Self {
        self.0.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Operation] {
        &self.0
    }

    /// Operation-by-operation inverse, in the same order
    pub fn inverse(&self) -> OperationSequence {
        self.0.iter().map(Operation::inverse).collect()
    }

    /// Apply to a column layout. `None` means the table does not exist.
    pub fn apply(&self, table: Option<Vec<Field>>) -> Result<Option<Vec<Field>>, SimulationError> {
        let mut table = table;
        let mut pending: Vec<Field> = Vec::new();

        for op in &self.0 {
            match op {
                Operation::AddColumn { field } => {
                    let columns = table.as_mut().unwrap_or(&mut pending);
                    if columns.iter().any(|c| c.name == field.name) {
                        return Err(SimulationError::ColumnExists(field.name.clone()));
                    }
                    columns.push(field.clone());
                }
                Operation::DropColumn { field } => {
                    let columns = table.as_mut().unwrap_or(&mut pending);
                    let position = columns
                        .iter()
                        .position(|c| c.name == field.name)
                        .ok_or_else(|| SimulationError::MissingColumn(field.name.clone()))?;
                    columns.remove(position);
                }
                Operation::AlterColumn { from, to } => {
                    let columns = table.as_mut().ok_or(SimulationError::MissingTable)?;
                    let column = columns
                        .iter_mut()
                        .find(|c| c.name == from.name)
                        .ok_or_else(|| SimulationError::MissingColumn(from.name.clone()))?;
                    if *column != *from {
                        return Err(SimulationError::ColumnMismatch {
                            column: from.name.clone(),
                        });
                    }
                    *column = to.clone();
                }
                Operation::CreateTable => {
                    if table.is_some() {
                        return Err(SimulationError::TableExists);
                    }
                    table = Some(std::mem::take(&mut pending));
                }
                Operation::DropTable => {
                    if table.take().is_none() {
                        return Err(SimulationError::MissingTable);
                    }
                }
            }
        }

        if table.is_none() && !pending.is_empty() {
            return Err(SimulationError::UnfinishedTable);
        }

        Ok(table)
    }
}

impl FromIterator<Operation> for OperationSequence {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Operation>> for OperationSequence {
    fn from(ops: Vec<Operation>) -> Self {
        Self(ops)
    }
}

impl<'a> IntoIterator for &'a OperationSequence {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
