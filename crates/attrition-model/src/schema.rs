//! Loading of the training-time column list.

use std::path::Path;

use attrition_core::{AttritionError, FeatureSchema, Result};
use tracing::info;

/// Read a JSON array of column names, e.g. `["satisfaction_level", ...]`.
///
/// # Errors
///
/// Returns [`AttritionError::Config`] if the file cannot be read, or the
/// array is empty or repeats a column.
pub fn load_schema(path: &Path) -> Result<FeatureSchema> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AttritionError::Config(format!("failed to read schema file {}: {e}", path.display()))
    })?;
    let schema: FeatureSchema = serde_json::from_str(&contents).map_err(|e| {
        AttritionError::Config(format!("invalid schema file {}: {e}", path.display()))
    })?;
    info!(path = %path.display(), columns = schema.len(), "Loaded feature schema");
    Ok(schema)
}
