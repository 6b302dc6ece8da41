//! JSON snapshot of the current state on disk

use crate::error::MigratorError;
use crate::schema::CurrentState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::CurrentStateReader;

/// Current state stored as a JSON object of table name to fields
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CurrentStateReader for SnapshotFile {
    async fn read_current_state(&self) -> Result<CurrentState, MigratorError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MigratorError::StateRead(format!(
                "{}: {} (create it containing {{}} to start from an empty database)",
                self.path.display(),
                e
            ))
        })?;

        let state: CurrentState = serde_json::from_str(&raw).map_err(|e| {
            MigratorError::StateRead(format!("{}: invalid snapshot: {}", self.path.display(), e))
        })?;

        debug!("Read {} tables from {}", state.len(), self.path.display());
        Ok(state)
    }

    async fn persist_current_state(&self, state: &CurrentState) -> Result<(), MigratorError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write then rename so a crash never leaves a truncated snapshot.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(state)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!("Saved snapshot of {} tables to {}", state.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    #[tokio::test]
    async fn test_missing_file_is_an_error_not_an_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("state.json"));

        let err = snapshot.read_current_state().await.unwrap_err();
        assert!(matches!(err, MigratorError::StateRead(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[not a map]").unwrap();

        let err = SnapshotFile::new(path).read_current_state().await.unwrap_err();
        assert!(matches!(err, MigratorError::StateRead(msg) if msg.contains("invalid snapshot")));
    }

    #[tokio::test]
    async fn test_persist_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("nested").join("state.json"));

        let mut state = CurrentState::new();
        state.insert("users", vec![Field::new("id", "integer").primary_key()]);
        snapshot.persist_current_state(&state).await.unwrap();

        assert_eq!(snapshot.read_current_state().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_empty_object_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{}").unwrap();

        let state = SnapshotFile::new(path).read_current_state().await.unwrap();
        assert!(state.is_empty());
    }
}
