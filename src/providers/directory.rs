//! Batch history recovered from previously written migration files

use crate::error::MigratorError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{BatchNumberProvider, Dialect};

static BATCH_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^MigrationBatch(\d+)\.[A-Za-z0-9]+$").expect("batch file pattern is valid")
});

/// Scans an output directory for `MigrationBatch<N>.<ext>` umbrella files
pub struct DirectoryBatchHistory {
    dir: PathBuf,
}

impl DirectoryBatchHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BatchNumberProvider for DirectoryBatchHistory {
    async fn current_batch(&self, _dialect: Dialect) -> Result<u32, MigratorError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist yet, no batches recorded", self.dir.display());
                return Ok(0);
            }
            Err(e) => {
                return Err(MigratorError::BatchNumber(format!("{}: {}", self.dir.display(), e)))
            }
        };

        let mut highest = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MigratorError::BatchNumber(format!("{}: {}", self.dir.display(), e)))?
        {
            let name = entry.file_name();
            let Some(captures) = name.to_str().and_then(|n| BATCH_FILE.captures(n)) else {
                continue;
            };
            let batch: u32 = captures[1].parse().map_err(|_| {
                MigratorError::BatchNumber(format!("batch number out of range: {:?}", name))
            })?;
            highest = highest.max(batch);
        }

        Ok(highest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_directory_means_no_batches() {
        let dir = tempfile::tempdir().unwrap();
        let history = DirectoryBatchHistory::new(dir.path().join("migrations"));
        assert_eq!(history.current_batch(Dialect::Postgres).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_highest_umbrella_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["MigrationBatch2.sql", "MigrationBatch10.sql", "MigrationBatch3.sql", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("MigrationBatch11")).unwrap();

        let history = DirectoryBatchHistory::new(dir.path());
        assert_eq!(history.current_batch(Dialect::Postgres).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_oversized_batch_number_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MigrationBatch99999999999.sql"), "").unwrap();

        let err = DirectoryBatchHistory::new(dir.path())
            .current_batch(Dialect::Postgres)
            .await
            .unwrap_err();
        assert!(matches!(err, MigratorError::BatchNumber(_)));
    }
}
