//! External collaborators of a generation run
//!
//! The generation core never performs I/O. Whatever it needs from the outside
//! world (the recorded column layout and the last batch number) comes in
//! through these traits.

mod directory;
mod memory;
mod postgres;
mod snapshot;

pub use directory::DirectoryBatchHistory;
pub use memory::{InMemoryBatchHistory, InMemoryState};
pub use postgres::{PostgresBatchHistory, PostgresCatalog};
pub use snapshot::SnapshotFile;

use crate::error::MigratorError;
use crate::schema::CurrentState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target database dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => f.write_str("postgres"),
        }
    }
}

impl FromStr for Dialect {
    type Err = MigratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "psql" => Ok(Dialect::Postgres),
            other => Err(MigratorError::Validation(format!("unknown dialect: {}", other))),
        }
    }
}

/// Supplies the last known column layout per table
#[async_trait]
pub trait CurrentStateReader: Send + Sync {
    /// Read the snapshot. Failing to read must be an error, never an empty
    /// state: an empty state classifies every existing table as new.
    async fn read_current_state(&self) -> Result<CurrentState, MigratorError>;

    /// Record `state` as the new baseline. Readers backed by a live catalog
    /// have nothing to persist.
    async fn persist_current_state(&self, _state: &CurrentState) -> Result<(), MigratorError> {
        Ok(())
    }
}

/// Supplies the highest batch number assigned so far
#[async_trait]
pub trait BatchNumberProvider: Send + Sync {
    /// Highest batch already assigned for `dialect`, 0 when there is none
    async fn current_batch(&self, dialect: Dialect) -> Result<u32, MigratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parses_aliases() {
        assert_eq!("psql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
        assert!("sqlite".parse::<Dialect>().is_err());
    }
}
