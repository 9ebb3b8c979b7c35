//! Configuration persistence.

use anyhow::{Context, Result};
use std::path::Path;

/// Write the entire config back to a TOML file (full replacement).
pub fn save_config(path: &Path, config: &super::Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write config file: {path:?}"))?;
    Ok(())
}
