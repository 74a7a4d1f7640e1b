use crate::config::Config;
use crate::validate::validate_config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const QUOTE_URL_ENV: &str = "TICKER_QUOTE_URL";
pub const MODULES_URL_ENV: &str = "TICKER_MODULES_URL";

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse TOML config file")?;

    validate_config(&config)?;

    Ok(config)
}

/// Endpoint overrides from the environment. `lookup` is `std::env::var` in
/// production; empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty(QUOTE_URL_ENV) {
        config.source.quote_url = url;
    }
    if let Some(url) = non_empty(MODULES_URL_ENV) {
        config.source.modules_url = url;
    }

    validate_config(config).with_context(|| "Invalid endpoint override from environment")
}
