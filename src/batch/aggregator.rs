//! Batch aggregation over rendered units

use crate::migration::{batch_name, normalize_identifier, MigrationUnit};
use crate::render::{MigrationRenderer, Procedure, RenderedMigration};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One call from the umbrella migration into a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub identifier: String,
    pub procedure: Procedure,
}

/// Umbrella migration of a batch, before rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPlan {
    /// `MigrationBatch<N>`
    pub name: String,
    pub identifier: String,
    pub batch: u32,
    /// Every unit's prepare, by table name
    pub upgrade: Vec<Invocation>,
    /// Every unit's revert, by table name descending
    pub downgrade: Vec<Invocation>,
}

/// Output of one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFiles {
    /// Rendered unit per table name
    pub sub_migrations: BTreeMap<String, RenderedMigration>,
    pub combined_migration: RenderedMigration,
    pub migration_name: String,
    pub batch_number: String,
    /// The operation IR behind `sub_migrations`
    pub units: BTreeMap<String, MigrationUnit>,
    #[serde(skip)]
    batch: u32,
}

impl MigrationFiles {
    pub fn batch(&self) -> u32 {
        self.batch
    }

    pub fn is_empty(&self) -> bool {
        self.sub_migrations.is_empty()
    }

    /// Digest over every rendered artifact of the batch
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.combined_migration.checksum.as_bytes());
        for (name, rendered) in &self.sub_migrations {
            hasher.update(name.as_bytes());
            hasher.update(rendered.checksum.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// The batch aggregator
pub struct BatchAggregator;

impl BatchAggregator {
    /// Plan the umbrella migration for `units`
    pub fn plan(units: &BTreeMap<String, MigrationUnit>, batch: u32) -> BatchPlan {
        let identifiers: Vec<String> = units.values().map(|u| u.identifier(batch)).collect();
        let name = batch_name(batch);

        BatchPlan {
            identifier: normalize_identifier(&name),
            name,
            batch,
            upgrade: identifiers
                .iter()
                .map(|identifier| Invocation {
                    identifier: identifier.clone(),
                    procedure: Procedure::Prepare,
                })
                .collect(),
            downgrade: identifiers
                .iter()
                .rev()
                .map(|identifier| Invocation {
                    identifier: identifier.clone(),
                    procedure: Procedure::Revert,
                })
                .collect(),
        }
    }

    /// Render every unit and the umbrella migration under `batch`
    pub fn aggregate(
        renderer: &dyn MigrationRenderer,
        units: BTreeMap<String, MigrationUnit>,
        batch: u32,
    ) -> MigrationFiles {
        let sub_migrations = units
            .iter()
            .map(|(table, unit)| (table.clone(), renderer.render_unit(unit, batch)))
            .collect();

        let plan = Self::plan(&units, batch);
        let combined_migration = renderer.render_batch(&plan);

        MigrationFiles {
            sub_migrations,
            combined_migration,
            migration_name: plan.name,
            batch_number: batch.to_string(),
            units,
            batch,
        }
    }
}
