//! Configuration tree loaded from `mediarch.toml`, with environment overrides
//! and free-function defaults for every tunable.

pub mod persist;
mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {path:?}"))?;

    let config: Config =
        toml::from_str(&content).with_context(|| format!("failed to parse config file: {path:?}"))?;

    validate_config(&config)?;
    Ok(config)
}

/// Load config from `./mediarch.toml` if present, otherwise fall back to defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_path = Path::new("./mediarch.toml");
    if default_path.exists() {
        return load_config(default_path);
    }

    Ok(Config::default())
}

fn validate_config(config: &Config) -> Result<()> {
    if config.scheduler.tick_interval_secs == 0 {
        anyhow::bail!("scheduler.tick_interval_secs cannot be 0");
    }

    if config.gc.run_at_hour > 23 {
        anyhow::bail!("gc.run_at_hour must be 0-23");
    }

    for provider in &config.providers {
        if provider.enabled && provider.api_key.as_deref().unwrap_or_default().is_empty() {
            anyhow::bail!("provider '{}' is enabled but has no api_key", provider.name);
        }
    }

    Ok(())
}
