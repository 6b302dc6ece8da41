//! Writes generated batches to an output directory
//!
//! Layout for batch N with renderer extension `ext`:
//!
//! ```text
//! <out>/MigrationBatchN.ext                 umbrella migration
//! <out>/MigrationBatchN/<identifier>.ext    one per table
//! <out>/MigrationBatchN/manifest.json       members and checksums
//! ```

use crate::batch::MigrationFiles;
use crate::error::MigratorError;
use crate::migration::UnitKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One table's entry in a batch manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub table: String,
    pub identifier: String,
    pub kind: UnitKind,
    pub file: String,
    pub checksum: String,
}

/// Record of what a batch contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchManifest {
    pub batch: u32,
    pub name: String,
    pub file: String,
    pub checksum: String,
    pub fingerprint: String,
    pub generated_at: DateTime<Utc>,
    pub members: Vec<ManifestEntry>,
}

/// Paths written for one batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenBatch {
    pub umbrella: PathBuf,
    pub units: Vec<PathBuf>,
    pub manifest: PathBuf,
}

/// Writes `MigrationFiles` under a fixed output directory
pub struct MigrationWriter {
    dir: PathBuf,
}

impl MigrationWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every artifact of `files`. Fails with `BatchExists` when the
    /// umbrella file of the batch is already present.
    pub async fn write(
        &self,
        files: &MigrationFiles,
        extension: &str,
    ) -> Result<WrittenBatch, MigratorError> {
        let umbrella_file = format!("{}.{}", files.migration_name, extension);
        let umbrella = self.dir.join(&umbrella_file);

        match tokio::fs::metadata(&umbrella).await {
            Ok(_) => return Err(MigratorError::BatchExists(files.batch())),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let batch_dir = self.dir.join(&files.migration_name);
        tokio::fs::create_dir_all(&batch_dir).await?;

        let mut units = Vec::with_capacity(files.sub_migrations.len());
        let mut members = Vec::with_capacity(files.sub_migrations.len());
        for (table, rendered) in &files.sub_migrations {
            let file = format!("{}.{}", rendered.identifier, extension);
            let path = batch_dir.join(&file);
            tokio::fs::write(&path, &rendered.content).await?;
            debug!("Wrote {} for table {}", path.display(), table);

            let kind = files
                .units
                .get(table)
                .map(|unit| unit.kind)
                .ok_or_else(|| {
                    MigratorError::Validation(format!("no migration unit for table {}", table))
                })?;

            members.push(ManifestEntry {
                table: table.clone(),
                identifier: rendered.identifier.clone(),
                kind,
                file: format!("{}/{}", files.migration_name, file),
                checksum: rendered.checksum.clone(),
            });
            units.push(path);
        }

        let manifest = BatchManifest {
            batch: files.batch(),
            name: files.migration_name.clone(),
            file: umbrella_file,
            checksum: files.combined_migration.checksum.clone(),
            fingerprint: files.fingerprint(),
            generated_at: Utc::now(),
            members,
        };
        let manifest_path = batch_dir.join("manifest.json");
        tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).await?;

        // Umbrella last: its presence marks the batch as complete.
        tokio::fs::write(&umbrella, &files.combined_migration.content).await?;

        info!(
            "Wrote {} with {} table migrations to {}",
            files.migration_name,
            units.len(),
            self.dir.display()
        );

        Ok(WrittenBatch {
            umbrella,
            units,
            manifest: manifest_path,
        })
    }

    /// Read back the manifest of `batch`
    pub async fn read_manifest(&self, batch: u32) -> Result<BatchManifest, MigratorError> {
        let path = self
            .dir
            .join(crate::migration::batch_name(batch))
            .join("manifest.json");
        let raw = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchAggregator;
    use crate::diff::TableClassifier;
    use crate::render::{MigrationRenderer, PostgresRenderer};
    use crate::schema::{CurrentState, Field, Table};
    use pretty_assertions::assert_eq;

    fn generated(batch: u32) -> MigrationFiles {
        let mut current = CurrentState::new();
        current.insert("legacy", vec![Field::new("id", "integer")]);
        let desired = vec![Table::new(
            "User+Tags",
            vec![Field::new("id", "integer").primary_key()],
        )];

        let units = TableClassifier::default()
            .classify(&current, &desired)
            .into_units();
        BatchAggregator::aggregate(&PostgresRenderer, units, batch)
    }

    #[tokio::test]
    async fn test_writes_umbrella_units_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MigrationWriter::new(dir.path());
        let files = generated(3);

        let written = writer
            .write(&files, PostgresRenderer.extension())
            .await
            .unwrap();

        assert_eq!(written.umbrella, dir.path().join("MigrationBatch3.sql"));
        assert_eq!(
            std::fs::read_to_string(&written.umbrella).unwrap(),
            files.combined_migration.content
        );
        assert_eq!(
            written.units,
            vec![
                dir.path().join("MigrationBatch3").join("MigrationBatch3_User_Tags.sql"),
                dir.path().join("MigrationBatch3").join("MigrationBatch3_legacy.sql"),
            ]
        );

        let manifest = writer.read_manifest(3).await.unwrap();
        assert_eq!(manifest.batch, 3);
        assert_eq!(manifest.file, "MigrationBatch3.sql");
        assert_eq!(manifest.fingerprint, files.fingerprint());
        let kinds: Vec<_> = manifest.members.iter().map(|m| (m.table.as_str(), m.kind)).collect();
        assert_eq!(
            kinds,
            vec![("User+Tags", UnitKind::Created), ("legacy", UnitKind::Dropped)]
        );
        assert_eq!(
            manifest.members[0].checksum,
            files.sub_migrations["User+Tags"].checksum
        );
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite_a_batch() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MigrationWriter::new(dir.path());
        let files = generated(1);

        writer.write(&files, "sql").await.unwrap();
        let err = writer.write(&files, "sql").await.unwrap_err();
        assert!(matches!(err, MigratorError::BatchExists(1)));
    }

    #[tokio::test]
    async fn test_creates_missing_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MigrationWriter::new(dir.path().join("out").join("migrations"));

        let written = writer.write(&generated(1), "sql").await.unwrap();
        assert!(written.umbrella.exists());
        assert!(written.manifest.exists());
    }
}
