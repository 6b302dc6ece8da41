//! Identifier derivation

/// Turn a logical name into an identifier. `+` is not a legal identifier
/// character and becomes `_`.
pub fn normalize_identifier(name: &str) -> String {
    name.replace('+', "_")
}

/// Name of the batch umbrella migration
pub fn batch_name(batch: u32) -> String {
    format!("MigrationBatch{}", batch)
}

/// Batch-scoped identifier of one table's migration
pub fn unit_identifier(batch: u32, name: &str) -> String {
    format!("{}_{}", batch_name(batch), normalize_identifier(name))
}
