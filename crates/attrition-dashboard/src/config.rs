//! YAML configuration loading for the dashboard server.
//!
//! Loads [`DashboardConfig`] from a YAML file on disk, falling back to
//! defaults for every key the file leaves out.

use attrition_core::DashboardConfig;
use std::path::Path;

/// Load a [`DashboardConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the YAML is invalid, or the
/// resulting settings fail [`DashboardConfig::validate`].
pub fn load_config(path: &Path) -> anyhow::Result<DashboardConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: DashboardConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    config.validate()?;
    Ok(config)
}
