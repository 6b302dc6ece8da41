//! Desired-schema validation
//!
//! Runs before classification. The diff core trusts its input, so anything it
//! would silently get wrong (duplicate names, identifiers colliding after
//! normalization) is rejected here.

use crate::error::MigratorError;
use crate::migration::normalize_identifier;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use validator::{Validate, ValidationError};

use super::Table;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]*$").expect("identifier pattern is valid")
});

// `+` is allowed in table names and normalized away when rendering.
static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$+]*$").expect("table name pattern is valid")
});

/// Validate a column identifier
pub(crate) fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if !IDENTIFIER.is_match(name) {
        let mut err = ValidationError::new("invalid_identifier");
        err.message = Some("Must start with a letter or underscore and contain only alphanumerics, underscores or $".into());
        return Err(err);
    }
    Ok(())
}

/// Validate a table name
pub(crate) fn validate_table_name(name: &str) -> Result<(), ValidationError> {
    if !TABLE_NAME.is_match(name) {
        let mut err = ValidationError::new("invalid_table_name");
        err.message = Some("Must start with a letter or underscore and contain only alphanumerics, underscores, $ or +".into());
        return Err(err);
    }
    Ok(())
}

/// Check a desired schema before it is diffed.
pub fn validate_desired(tables: &[Table]) -> Result<(), MigratorError> {
    let mut identifiers: BTreeMap<String, &str> = BTreeMap::new();

    for table in tables {
        table
            .validate()
            .map_err(|e| MigratorError::Validation(format!("table {}: {}", table.name, e)))?;

        if let Some(previous) = identifiers.insert(normalize_identifier(&table.name), &table.name) {
            if previous == table.name {
                return Err(MigratorError::DuplicateTable(table.name.clone()));
            }
            return Err(MigratorError::IdentifierCollision {
                first: previous.to_string(),
                second: table.name.clone(),
                identifier: normalize_identifier(&table.name),
            });
        }

        let mut seen = HashSet::new();
        for field in &table.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(MigratorError::DuplicateField {
                    table: table.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
    }

    Ok(())
}
