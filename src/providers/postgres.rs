//! PostgreSQL-backed collaborators
//!
//! `PostgresCatalog` introspects the live catalog for the current column
//! layout; `PostgresBatchHistory` reads the highest batch number from the
//! migration history table.

use crate::error::MigratorError;
use crate::schema::{CurrentState, Field};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::collections::BTreeMap;
use tracing::debug;

use super::{BatchNumberProvider, CurrentStateReader, Dialect};

/// Columns of every base table in a schema, in ordinal order
const LIST_COLUMNS: &str = r#"
    SELECT
        c.table_name::text AS table_name,
        c.column_name::text AS column_name,
        c.data_type::text AS data_type,
        c.is_nullable = 'YES' AS nullable,
        c.column_default::text AS column_default,
        COALESCE(pk.is_pk, false) AS is_primary_key,
        COALESCE(uq.is_unique, false) AS is_unique
    FROM information_schema.columns c
    JOIN information_schema.tables t
        ON t.table_schema = c.table_schema
        AND t.table_name = c.table_name
        AND t.table_type = 'BASE TABLE'
    LEFT JOIN (
        SELECT kcu.table_name, kcu.column_name, true AS is_pk
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        WHERE tc.constraint_type = 'PRIMARY KEY'
            AND tc.table_schema = $1::text
    ) pk ON c.table_name = pk.table_name AND c.column_name = pk.column_name
    LEFT JOIN (
        SELECT kcu.table_name, kcu.column_name, true AS is_unique
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        WHERE tc.constraint_type = 'UNIQUE'
            AND tc.table_schema = $1::text
    ) uq ON c.table_name = uq.table_name AND c.column_name = uq.column_name
    WHERE c.table_schema = $1::text
        AND c.table_name <> $2::text
    ORDER BY c.table_name, c.ordinal_position
"#;

/// Reads the current state from `information_schema`
pub struct PostgresCatalog {
    pool: Pool,
    schema: String,
    history_table: String,
}

impl PostgresCatalog {
    /// `history_table` is excluded from the snapshot
    pub fn new(pool: Pool, schema: impl Into<String>, history_table: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            history_table: history_table.into(),
        }
    }
}

#[async_trait]
impl CurrentStateReader for PostgresCatalog {
    async fn read_current_state(&self) -> Result<CurrentState, MigratorError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigratorError::StateRead(format!("Database pool error: {}", e)))?;

        let rows = client
            .query(LIST_COLUMNS, &[&self.schema, &self.history_table])
            .await
            .map_err(|e| MigratorError::StateRead(format!("Catalog query failed: {}", e)))?;

        let mut tables: BTreeMap<String, Vec<Field>> = BTreeMap::new();
        for row in rows {
            let table: String = row.get("table_name");
            tables.entry(table).or_default().push(Field {
                name: row.get("column_name"),
                data_type: row.get("data_type"),
                nullable: row.get("nullable"),
                primary_key: row.get("is_primary_key"),
                unique: row.get("is_unique"),
                default_value: row.get("column_default"),
            });
        }

        debug!("Introspected {} tables in schema {}", tables.len(), self.schema);
        Ok(tables.into_iter().collect())
    }
}

/// Reads the highest assigned batch from a history table with a `batch` column
pub struct PostgresBatchHistory {
    pool: Pool,
    schema: String,
    table: String,
}

impl PostgresBatchHistory {
    pub fn new(pool: Pool, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            table: table.into(),
        }
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Schema-qualified, quoted name; resolved verbatim by `to_regclass`
fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote(schema), quote(table))
}

fn max_batch_query(schema: &str, table: &str) -> String {
    format!(
        "SELECT COALESCE(MAX(batch), 0)::BIGINT AS batch FROM {}",
        qualified_name(schema, table)
    )
}

#[async_trait]
impl BatchNumberProvider for PostgresBatchHistory {
    async fn current_batch(&self, dialect: Dialect) -> Result<u32, MigratorError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigratorError::BatchNumber(format!("Database pool error: {}", e)))?;

        let qualified = qualified_name(&self.schema, &self.table);
        let exists: bool = client
            .query_one("SELECT to_regclass($1::text) IS NOT NULL AS present", &[&qualified])
            .await
            .map_err(|e| MigratorError::BatchNumber(e.to_string()))?
            .get("present");
        if !exists {
            debug!("History table {} not found, no {} batches recorded", qualified, dialect);
            return Ok(0);
        }

        let batch: i64 = client
            .query_one(&max_batch_query(&self.schema, &self.table), &[])
            .await
            .map_err(|e| MigratorError::BatchNumber(e.to_string()))?
            .get("batch");

        u32::try_from(batch)
            .map_err(|_| MigratorError::BatchNumber(format!("batch number out of range: {}", batch)))
    }
}
