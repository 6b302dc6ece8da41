//! In-memory collaborators

use crate::error::MigratorError;
use crate::schema::CurrentState;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{BatchNumberProvider, CurrentStateReader, Dialect};

/// Current state held in memory
pub struct InMemoryState {
    state: RwLock<CurrentState>,
}

impl InMemoryState {
    pub fn new(state: CurrentState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn snapshot(&self) -> CurrentState {
        self.state.read().await.clone()
    }
}

impl Default for InMemoryState {
    fn default() -> Self {
        Self::new(CurrentState::new())
    }
}

#[async_trait]
impl CurrentStateReader for InMemoryState {
    async fn read_current_state(&self) -> Result<CurrentState, MigratorError> {
        Ok(self.state.read().await.clone())
    }

    async fn persist_current_state(&self, state: &CurrentState) -> Result<(), MigratorError> {
        *self.state.write().await = state.clone();
        Ok(())
    }
}

/// Batch history held in memory, per dialect
#[derive(Default)]
pub struct InMemoryBatchHistory {
    batches: RwLock<HashMap<Dialect, u32>>,
}

impl InMemoryBatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History whose latest batch for `dialect` is `batch`
    pub fn starting_at(dialect: Dialect, batch: u32) -> Self {
        Self {
            batches: RwLock::new(HashMap::from([(dialect, batch)])),
        }
    }

    /// Record `batch` as assigned. Lower numbers than the current one are ignored.
    pub async fn record(&self, dialect: Dialect, batch: u32) {
        let mut batches = self.batches.write().await;
        let current = batches.entry(dialect).or_insert(0);
        if batch > *current {
            *current = batch;
        }
    }
}

#[async_trait]
impl BatchNumberProvider for InMemoryBatchHistory {
    async fn current_batch(&self, dialect: Dialect) -> Result<u32, MigratorError> {
        Ok(self.batches.read().await.get(&dialect).copied().unwrap_or(0))
    }
}
