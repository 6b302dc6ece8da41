//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::migrator::AutoMigrator;
use crate::writer::MigrationWriter;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub migrator: AutoMigrator,

    /// Destination of generated batches
    pub writer: MigrationWriter,
}

impl AppState {
    pub fn new(migrator: AutoMigrator, writer: MigrationWriter) -> Self {
        Self { migrator, writer }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
