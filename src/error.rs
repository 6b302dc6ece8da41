//! Error handling module
//!
//! `MigratorError` covers the collaborators around the generation run (state
//! readers, batch history, writer, validation). The diff, classify, render and
//! aggregate steps are total and never produce one. `AppError` is the HTTP
//! facing wrapper.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors raised while preparing or persisting a generation run
#[derive(Error, Debug)]
pub enum MigratorError {
    #[error("Failed to read current schema state: {0}")]
    StateRead(String),

    #[error("Failed to determine batch number: {0}")]
    BatchNumber(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate table in desired schema: {0}")]
    DuplicateTable(String),

    #[error("Duplicate field {field} in table {table}")]
    DuplicateField { table: String, field: String },

    #[error("Tables {first} and {second} both normalize to identifier {identifier}")]
    IdentifierCollision {
        first: String,
        second: String,
        identifier: String,
    },

    #[error("Migration batch {0} already exists")]
    BatchExists(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Migrator(#[from] MigratorError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<String>) {
        match self {
            AppError::Migrator(e) => match e {
                MigratorError::Validation(_)
                | MigratorError::DuplicateTable(_)
                | MigratorError::DuplicateField { .. }
                | MigratorError::IdentifierCollision { .. } => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    e.to_string(),
                    None,
                ),
                MigratorError::BatchExists(_) => {
                    (StatusCode::CONFLICT, "CONFLICT", e.to_string(), None)
                }
                MigratorError::StateRead(msg) => {
                    error!("Current state unavailable: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STATE_UNAVAILABLE",
                        "Current schema state could not be read".to_string(),
                        Some(msg.clone()),
                    )
                }
                MigratorError::BatchNumber(msg) => {
                    error!("Batch number unavailable: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "BATCH_UNAVAILABLE",
                        "Next batch number could not be determined".to_string(),
                        Some(msg.clone()),
                    )
                }
                other => {
                    error!("Migrator error: {:?}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "MIGRATOR_ERROR",
                        "Migration generation failed".to_string(),
                        Some(other.to_string()),
                    )
                }
            },
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = self.parts();

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;
