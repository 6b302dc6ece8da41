//! Generation runs
//!
//! `AutoMigrator` wires the collaborators around the pure core: it reads the
//! current state, assigns the next batch number, validates the desired
//! schema, then classifies, renders and aggregates.

use crate::batch::{BatchAggregator, MigrationFiles};
use crate::diff::{ClassificationSummary, ColumnDiffer, DiffOptions, TableClassifier};
use crate::error::MigratorError;
use crate::migration::MigrationUnit;
use crate::providers::{BatchNumberProvider, CurrentStateReader, Dialect};
use crate::render::MigrationRenderer;
use crate::schema::{validate_desired, CurrentState, Table};
use crate::writer::{MigrationWriter, WrittenBatch};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of planning one batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub files: MigrationFiles,
    pub summary: ClassificationSummary,
}

/// Result of generating and writing one batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBatch {
    #[serde(flatten)]
    pub outcome: GenerationOutcome,
    /// `None` when nothing changed and no files were written
    pub written: Option<WrittenBatch>,
}

pub struct AutoMigrator {
    state: Arc<dyn CurrentStateReader>,
    batches: Arc<dyn BatchNumberProvider>,
    renderer: Arc<dyn MigrationRenderer>,
    dialect: Dialect,
    options: DiffOptions,
}

impl AutoMigrator {
    pub fn new(
        state: Arc<dyn CurrentStateReader>,
        batches: Arc<dyn BatchNumberProvider>,
        renderer: Arc<dyn MigrationRenderer>,
        dialect: Dialect,
    ) -> Self {
        Self {
            state,
            batches,
            renderer,
            dialect,
            options: DiffOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn renderer(&self) -> &dyn MigrationRenderer {
        self.renderer.as_ref()
    }

    /// Diff `desired` against the recorded state and render the next batch.
    /// Nothing is persisted.
    pub async fn plan(&self, desired: &[Table]) -> Result<GenerationOutcome, MigratorError> {
        let current = self.state.read_current_state().await?;
        let previous = self.batches.current_batch(self.dialect).await?;
        let batch = previous.checked_add(1).ok_or_else(|| {
            MigratorError::BatchNumber(format!("batch number {} cannot be incremented", previous))
        })?;
        debug!(
            "Planning batch {} for {} against {} recorded tables",
            batch,
            self.dialect,
            current.len()
        );

        validate_desired(desired)?;

        let classifier = TableClassifier::new(ColumnDiffer::new(self.options));
        let classified = classifier.classify(&current, desired);
        let summary = classified.summary();

        for table in &summary.created {
            info!("Table {} will be created", table);
        }
        for table in &summary.altered {
            info!("Table {} will be altered", table);
        }
        for table in &summary.dropped {
            warn!("Table {} will be dropped", table);
        }
        debug!("{} tables unchanged", summary.unchanged.len());

        let units = classified.into_units();
        check_unit_identifiers(&units)?;

        let files = BatchAggregator::aggregate(self.renderer.as_ref(), units, batch);
        info!(
            "Planned {} with {} table migrations",
            files.migration_name,
            files.sub_migrations.len()
        );

        Ok(GenerationOutcome { files, summary })
    }

    /// Plan the next batch, write it through `writer` and record `desired` as
    /// the new current state. A run with no changes writes nothing.
    ///
    /// The batch is written before the baseline is recorded. If recording
    /// fails the batch stays on disk and the error is returned; the next run
    /// diffs against the old baseline again, so delete the reported batch
    /// before retrying.
    pub async fn generate(
        &self,
        desired: &[Table],
        writer: &MigrationWriter,
    ) -> Result<GeneratedBatch, MigratorError> {
        let outcome = self.plan(desired).await?;

        if outcome.files.is_empty() {
            info!("Schema is up to date, nothing to write");
            return Ok(GeneratedBatch {
                outcome,
                written: None,
            });
        }

        let written = writer.write(&outcome.files, self.renderer.extension()).await?;
        if let Err(e) = self
            .state
            .persist_current_state(&CurrentState::from_desired(desired))
            .await
        {
            error!(
                "{} was written to {} but the baseline was not recorded: {}",
                outcome.files.migration_name,
                written.umbrella.display(),
                e
            );
            return Err(e);
        }

        Ok(GeneratedBatch {
            outcome,
            written: Some(written),
        })
    }
}

/// Two units whose names normalize alike would share procedure names and
/// output paths. This also covers a dropped table colliding with a created
/// one, which desired-schema validation cannot see.
fn check_unit_identifiers(units: &BTreeMap<String, MigrationUnit>) -> Result<(), MigratorError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (table, unit) in units {
        if let Some(first) = seen.insert(unit.name.as_str(), table.as_str()) {
            return Err(MigratorError::IdentifierCollision {
                first: first.to_string(),
                second: table.clone(),
                identifier: unit.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{Operation, UnitKind};
    use crate::providers::{DirectoryBatchHistory, InMemoryBatchHistory, InMemoryState};
    use crate::render::PostgresRenderer;
    use crate::schema::Field;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct FailingState;

    #[async_trait]
    impl CurrentStateReader for FailingState {
        async fn read_current_state(&self) -> Result<CurrentState, MigratorError> {
            Err(MigratorError::StateRead("snapshot unavailable".to_string()))
        }
    }

    struct FailingBatches;

    #[async_trait]
    impl BatchNumberProvider for FailingBatches {
        async fn current_batch(&self, _dialect: Dialect) -> Result<u32, MigratorError> {
            Err(MigratorError::BatchNumber("history unavailable".to_string()))
        }
    }

    /// Reads a fixed state but refuses to record a new one
    struct ReadOnlyState(CurrentState);

    #[async_trait]
    impl CurrentStateReader for ReadOnlyState {
        async fn read_current_state(&self) -> Result<CurrentState, MigratorError> {
            Ok(self.0.clone())
        }

        async fn persist_current_state(&self, _state: &CurrentState) -> Result<(), MigratorError> {
            Err(MigratorError::StateRead("snapshot is read-only".to_string()))
        }
    }

    fn current() -> CurrentState {
        let mut state = CurrentState::new();
        state.insert(
            "users",
            vec![Field::new("id", "integer").primary_key(), Field::new("nick", "text")],
        );
        state.insert("audit", vec![Field::new("id", "integer")]);
        state
    }

    fn desired() -> Vec<Table> {
        vec![
            Table::new(
                "users",
                vec![
                    Field::new("id", "integer").primary_key(),
                    Field::new("email", "text").not_null(),
                ],
            ),
            Table::new("posts", vec![Field::new("id", "integer").primary_key()]),
        ]
    }

    fn migrator(state: CurrentState, last_batch: u32) -> AutoMigrator {
        AutoMigrator::new(
            Arc::new(InMemoryState::new(state)),
            Arc::new(InMemoryBatchHistory::starting_at(Dialect::Postgres, last_batch)),
            Arc::new(PostgresRenderer),
            Dialect::Postgres,
        )
    }

    #[tokio::test]
    async fn test_plan_classifies_every_table() {
        let outcome = migrator(current(), 0).plan(&desired()).await.unwrap();

        assert_eq!(outcome.summary.created, vec!["posts".to_string()]);
        assert_eq!(outcome.summary.altered, vec!["users".to_string()]);
        assert_eq!(outcome.summary.dropped, vec!["audit".to_string()]);

        let users = &outcome.files.units["users"];
        assert_eq!(users.kind, UnitKind::Altered);
        assert_eq!(
            users.upgrade.as_slice(),
            &[
                Operation::AddColumn {
                    field: Field::new("email", "text").not_null()
                },
                Operation::DropColumn {
                    field: Field::new("nick", "text")
                },
            ]
        );
        assert_eq!(
            outcome.files.sub_migrations.keys().collect::<Vec<_>>(),
            vec!["audit", "posts", "users"]
        );
    }

    #[tokio::test]
    async fn test_batch_is_previous_plus_one() {
        let outcome = migrator(current(), 41).plan(&desired()).await.unwrap();

        assert_eq!(outcome.files.batch_number, "42");
        assert_eq!(outcome.files.migration_name, "MigrationBatch42");
        assert!(outcome
            .files
            .sub_migrations
            .values()
            .all(|r| r.identifier.starts_with("MigrationBatch42_")));
    }

    #[tokio::test]
    async fn test_state_failure_aborts() {
        let migrator = AutoMigrator::new(
            Arc::new(FailingState),
            Arc::new(InMemoryBatchHistory::new()),
            Arc::new(PostgresRenderer),
            Dialect::Postgres,
        );

        let err = migrator.plan(&desired()).await.unwrap_err();
        assert!(matches!(err, MigratorError::StateRead(_)));
    }

    #[tokio::test]
    async fn test_batch_failure_aborts() {
        let migrator = AutoMigrator::new(
            Arc::new(InMemoryState::new(current())),
            Arc::new(FailingBatches),
            Arc::new(PostgresRenderer),
            Dialect::Postgres,
        );

        let err = migrator.plan(&desired()).await.unwrap_err();
        assert!(matches!(err, MigratorError::BatchNumber(_)));
    }

    #[tokio::test]
    async fn test_dropped_table_colliding_with_created_table_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = CurrentState::new();
        state.insert("a+b", vec![Field::new("id", "integer")]);
        let tables = vec![Table::new(
            "a_b",
            vec![Field::new("id", "integer"), Field::new("x", "text")],
        )];
        let migrator = migrator(state, 0);

        let err = migrator.plan(&tables).await.unwrap_err();
        match err {
            MigratorError::IdentifierCollision { first, second, identifier } => {
                assert_eq!(first, "a+b");
                assert_eq!(second, "a_b");
                assert_eq!(identifier, "a_b");
            }
            other => panic!("expected collision, got {:?}", other),
        }

        let writer = MigrationWriter::new(dir.path());
        assert!(migrator.generate(&tables, &writer).await.is_err());
        assert!(!dir.path().join("MigrationBatch1.sql").exists());
        assert!(!dir.path().join("MigrationBatch1").exists());
    }

    #[tokio::test]
    async fn test_baseline_failure_is_reported_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = AutoMigrator::new(
            Arc::new(ReadOnlyState(current())),
            Arc::new(DirectoryBatchHistory::new(dir.path())),
            Arc::new(PostgresRenderer),
            Dialect::Postgres,
        );

        let err = migrator
            .generate(&desired(), &MigrationWriter::new(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, MigratorError::StateRead(msg) if msg.contains("read-only")));
        assert!(dir.path().join("MigrationBatch1.sql").exists());
    }

    #[tokio::test]
    async fn test_invalid_desired_schema_is_rejected() {
        let tables = vec![
            Table::new("users", vec![Field::new("id", "integer")]),
            Table::new("users", vec![Field::new("id", "integer")]),
        ];

        let err = migrator(CurrentState::new(), 0).plan(&tables).await.unwrap_err();
        assert!(matches!(err, MigratorError::DuplicateTable(name) if name == "users"));
    }

    #[tokio::test]
    async fn test_plan_is_deterministic() {
        let migrator = migrator(current(), 7);
        let a = migrator.plan(&desired()).await.unwrap();
        let mut reversed = desired();
        reversed.reverse();
        let b = migrator.plan(&reversed).await.unwrap();

        assert_eq!(a.files.fingerprint(), b.files.fingerprint());
        assert_eq!(a.files.combined_migration, b.files.combined_migration);
    }

    #[tokio::test]
    async fn test_generate_writes_and_advances_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(InMemoryState::new(current()));
        let migrator = AutoMigrator::new(
            state.clone(),
            Arc::new(DirectoryBatchHistory::new(dir.path())),
            Arc::new(PostgresRenderer),
            Dialect::Postgres,
        );
        let writer = MigrationWriter::new(dir.path());

        let first = migrator.generate(&desired(), &writer).await.unwrap();
        assert_eq!(first.outcome.files.batch_number, "1");
        assert!(first.written.is_some());
        assert_eq!(state.snapshot().await, CurrentState::from_desired(&desired()));

        let second = migrator.generate(&desired(), &writer).await.unwrap();
        assert!(second.written.is_none());
        assert_eq!(second.outcome.files.batch_number, "2");
        assert_eq!(second.outcome.summary.unchanged, vec!["posts", "users"]);
    }
}
