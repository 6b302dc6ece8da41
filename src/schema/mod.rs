//! Schema model
//!
//! Column and table descriptors shared by the current-state snapshot and the
//! desired schema, plus the caller-side validation of a desired schema.

mod model;
mod validation;

pub use model::{CurrentState, Field, Table};
pub use validation::validate_desired;
