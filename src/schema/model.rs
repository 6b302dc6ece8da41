//! Field, table and current-state models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use super::validation::{validate_identifier, validate_table_name};

fn default_nullable() -> bool {
    true
}

/// Column descriptor
///
/// Two fields describe the same column when their names match; they are
/// identical when every attribute matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[validate(length(min = 1, max = 63, message = "Field name must be between 1 and 63 characters"))]
    #[validate(custom(function = "validate_identifier"))]
    pub name: String,

    #[validate(length(min = 1, message = "Field type is required"))]
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub unique: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Field {
    /// Nullable column with no constraints
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// A desired table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[validate(length(min = 1, max = 63, message = "Table name must be between 1 and 63 characters"))]
    #[validate(custom(function = "validate_table_name"))]
    pub name: String,

    #[validate(nested)]
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Table {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Last known column layout per table
///
/// Keyed by table name; iteration is lexicographic so anything derived from
/// a snapshot is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrentState {
    tables: BTreeMap<String, Vec<Field>>,
}

impl CurrentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, fields: Vec<Field>) {
        self.tables.insert(table.into(), fields);
    }

    pub fn get(&self, table: &str) -> Option<&[Field]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Field])> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Working copy of the underlying map
    pub(crate) fn to_map(&self) -> BTreeMap<String, Vec<Field>> {
        self.tables.clone()
    }

    /// The snapshot that results from converging to `desired`
    pub fn from_desired(desired: &[Table]) -> Self {
        Self {
            tables: desired
                .iter()
                .map(|t| (t.name.clone(), t.fields.clone()))
                .collect(),
        }
    }
}

impl FromIterator<(String, Vec<Field>)> for CurrentState {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Field>)>>(iter: I) -> Self {
        Self {
            tables: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_deserializes_with_defaults() {
        let field: Field = serde_json::from_str(r#"{"name": "email", "type": "text"}"#).unwrap();
        assert_eq!(field, Field::new("email", "text"));
        assert!(field.nullable);
    }

    #[test]
    fn test_current_state_is_transparent_map() {
        let json = r#"{"users": [{"name": "id", "type": "integer", "nullable": false, "primaryKey": true}]}"#;
        let state: CurrentState = serde_json::from_str(json).unwrap();

        assert_eq!(state.len(), 1);
        assert_eq!(state.get("users").unwrap(), &[Field::new("id", "integer").primary_key()]);
    }

    #[test]
    fn test_table_names_are_sorted() {
        let state: CurrentState = vec![
            ("posts".to_string(), vec![]),
            ("accounts".to_string(), vec![]),
            ("users".to_string(), vec![]),
        ]
        .into_iter()
        .collect();

        let names: Vec<_> = state.table_names().collect();
        assert_eq!(names, vec!["accounts", "posts", "users"]);
    }

    #[test]
    fn test_from_desired_takes_every_table() {
        let desired = vec![
            Table::new("users", vec![Field::new("id", "integer")]),
            Table::new("posts", vec![]),
        ];
        let state = CurrentState::from_desired(&desired);

        assert!(state.contains("users"));
        assert!(state.contains("posts"));
        assert_eq!(state.get("users").unwrap().len(), 1);
    }
}
