//! Migration intermediate representation
//!
//! Abstract schema operations, the per-table migration unit built from them,
//! and the identifier rules shared by every renderer.

mod naming;
mod operation;
mod unit;

pub use naming::{batch_name, normalize_identifier, unit_identifier};
pub use operation::{Operation, OperationSequence, SimulationError};
pub use unit::{MigrationUnit, UnitKind};
#[cfg(test)]
pub(crate) use unit::same_columns;
