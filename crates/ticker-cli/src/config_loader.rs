use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;
use ticker_config::{apply_env_overrides, load_config, validate_config, Config};
use ticker_fetch::net::{RetryPolicy, TransportConfig};
use ticker_fetch::ClientConfig;

/// Endpoint overrides given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub quote_url: Option<String>,
    pub modules_url: Option<String>,
}

/// File (or defaults), then environment, then command line.
pub fn load_effective_config(
    explicit_path: Option<&PathBuf>,
    overrides: &Overrides,
) -> Result<Config> {
    let config_file = explicit_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from("ticker.toml"));

    if explicit_path.is_some() && !config_file.exists() {
        bail!("Config file not found: {:?}", config_file);
    }

    let mut config = load_config(&config_file)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    if let Some(url) = &overrides.quote_url {
        config.source.quote_url = url.clone();
    }
    if let Some(url) = &overrides.modules_url {
        config.source.modules_url = url.clone();
    }
    validate_config(&config)?;

    Ok(config)
}

pub fn to_client_config(config: &Config) -> ClientConfig {
    let mut transport = TransportConfig {
        connect_timeout: Duration::from_millis(config.source.connect_timeout_ms),
        request_timeout: Duration::from_millis(config.source.timeout_ms),
        retry: RetryPolicy {
            max_attempts: config.retry.max_attempts,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            max_delay: Duration::from_millis(config.retry.max_delay_ms),
            jitter_factor: config.retry.jitter,
        },
        ..TransportConfig::default()
    };
    if let Some(agent) = &config.source.user_agent {
        transport.user_agent = agent.clone();
    }

    ClientConfig {
        quote_url: config.source.quote_url.clone(),
        modules_url: config.source.modules_url.clone(),
        chunk_size: config.source.chunk_size,
        max_in_flight: config.source.max_in_flight,
        ttl: Duration::from_secs(config.cache.ttl_secs),
        transport,
    }
}
