//! Migration generation route handlers
//!
//! Both routes take the desired schema as `{ "tables": [...] }`. Planning
//! never touches disk; generating writes the batch and advances the baseline.

use crate::error::{ApiResult, AppError};
use crate::migrator::{GeneratedBatch, GenerationOutcome};
use crate::schema::Table;
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct DesiredSchemaRequest {
    #[validate(nested)]
    pub tables: Vec<Table>,
}

/// Standard success response wrapper
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Preview the next batch without persisting anything
pub async fn plan_migration(
    State(state): State<SharedState>,
    Json(payload): Json<DesiredSchemaRequest>,
) -> ApiResult<Json<SuccessResponse<GenerationOutcome>>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    debug!("Planning migration for {} desired tables", payload.tables.len());

    let outcome = state.migrator.plan(&payload.tables).await?;
    let message = format!(
        "{} planned with {} changed tables",
        outcome.files.migration_name,
        outcome.summary.total_changes()
    );

    Ok(Json(SuccessResponse::with_data(message, outcome)))
}

/// Generate the next batch, write it and record the desired schema
pub async fn generate_migration(
    State(state): State<SharedState>,
    Json(payload): Json<DesiredSchemaRequest>,
) -> ApiResult<Json<SuccessResponse<GeneratedBatch>>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let generated = state
        .migrator
        .generate(&payload.tables, &state.writer)
        .await?;

    let message = match &generated.written {
        Some(written) => {
            info!("Generated batch at {}", written.umbrella.display());
            format!("{} generated", generated.outcome.files.migration_name)
        }
        None => "Schema is up to date".to_string(),
    };

    Ok(Json(SuccessResponse::with_data(message, generated)))
}

#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::migrator::AutoMigrator;
    use crate::providers::{Dialect, InMemoryBatchHistory, InMemoryState};
    use crate::render::PostgresRenderer;
    use crate::routes::create_router;
    use crate::schema::{CurrentState, Field};
    use crate::state::AppState;
    use crate::writer::MigrationWriter;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(out: &Path, current: CurrentState) -> Router {
        let migrator = AutoMigrator::new(
            Arc::new(InMemoryState::new(current)),
            Arc::new(InMemoryBatchHistory::starting_at(Dialect::Postgres, 2)),
            Arc::new(PostgresRenderer),
            Dialect::Postgres,
        );
        let state = Arc::new(AppState::new(migrator, MigrationWriter::new(out)));
        let settings = Settings::from_lookup(|_| None).unwrap();
        create_router(state, &settings)
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn desired() -> Value {
        json!({
            "tables": [
                { "name": "users", "fields": [
                    { "name": "id", "type": "integer", "primaryKey": true, "nullable": false },
                    { "name": "email", "type": "text" }
                ]}
            ]
        })
    }

    #[tokio::test]
    async fn test_plan_returns_batch_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = post(app(dir.path(), CurrentState::new()), "/api/migrations/plan", desired()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["files"]["migrationName"], json!("MigrationBatch3"));
        assert_eq!(body["summary"]["created"], json!(["users"]));
        assert!(!dir.path().join("MigrationBatch3.sql").exists());
    }

    #[tokio::test]
    async fn test_generate_writes_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut current = CurrentState::new();
        current.insert("users", vec![Field::new("id", "integer").primary_key()]);

        let (status, body) = post(app(dir.path(), current), "/api/migrations/generate", desired()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["altered"], json!(["users"]));
        assert!(dir.path().join("MigrationBatch3.sql").exists());
        assert!(dir
            .path()
            .join("MigrationBatch3")
            .join("MigrationBatch3_users.sql")
            .exists());
    }

    #[tokio::test]
    async fn test_invalid_table_name_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let body = json!({ "tables": [{ "name": "bad name", "fields": [] }] });

        let (status, body) = post(app(dir.path(), CurrentState::new()), "/api/migrations/plan", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }
}
