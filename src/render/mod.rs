//! Migration script rendering
//!
//! Turns the operation IR into target-runtime source text. Renderers are
//! swappable; the diff and aggregation steps never look at the text.

mod postgres;

pub use postgres::PostgresRenderer;

use crate::batch::BatchPlan;
use crate::migration::MigrationUnit;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The two procedures every migration exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Procedure {
    /// Apply the upgrade
    Prepare,
    /// Apply the downgrade
    Revert,
}

impl Procedure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Procedure::Prepare => "prepare",
            Procedure::Revert => "revert",
        }
    }
}

/// A rendered, self-contained migration artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMigration {
    /// Logical name (table name or batch name)
    pub name: String,
    /// Identifier the procedures are scoped under
    pub identifier: String,
    pub content: String,
    /// SHA-256 of `content`
    pub checksum: String,
}

impl RenderedMigration {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>, content: String) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let checksum = format!("{:x}", hasher.finalize());

        Self {
            name: name.into(),
            identifier: identifier.into(),
            content,
            checksum,
        }
    }
}

/// Renders migration units and batch umbrellas
pub trait MigrationRenderer: Send + Sync {
    /// File extension for rendered artifacts
    fn extension(&self) -> &'static str;

    /// Render one table's unit, scoped under `batch`
    fn render_unit(&self, unit: &MigrationUnit, batch: u32) -> RenderedMigration;

    /// Render the umbrella migration of a batch
    fn render_batch(&self, plan: &BatchPlan) -> RenderedMigration;
}
