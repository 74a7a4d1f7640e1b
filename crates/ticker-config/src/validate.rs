use crate::config::Config;
use anyhow::{bail, Result};
use url::Url;

pub fn validate_config(config: &Config) -> Result<()> {
    let source = &config.source;

    for (field, value) in [
        ("source.quote_url", &source.quote_url),
        ("source.modules_url", &source.modules_url),
    ] {
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => bail!(
                "Invalid config field '{}': unsupported scheme '{}'",
                field,
                url.scheme()
            ),
            Err(e) => bail!("Invalid config field '{}': {}", field, e),
        }
    }

    if source.chunk_size == 0 || source.chunk_size > 1000 {
        bail!("Invalid config field 'source.chunk_size': must be between 1 and 1000");
    }

    if source.max_in_flight == 0 || source.max_in_flight > 256 {
        bail!("Invalid config field 'source.max_in_flight': must be between 1 and 256");
    }

    if source.timeout_ms == 0 || source.connect_timeout_ms == 0 {
        bail!("Invalid config field 'source.timeout_ms': timeouts must be non-zero");
    }

    if config.cache.ttl_secs == 0 || config.cache.ttl_secs > 86_400 {
        bail!("Invalid config field 'cache.ttl_secs': must be between 1 and 86400 (one day)");
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 || retry.max_attempts > 10 {
        bail!("Invalid config field 'retry.max_attempts': must be between 1 and 10");
    }

    if retry.base_delay_ms > retry.max_delay_ms {
        bail!(
            "Invalid config field 'retry.base_delay_ms': {} exceeds retry.max_delay_ms ({})",
            retry.base_delay_ms,
            retry.max_delay_ms
        );
    }

    if !(0.0..=1.0).contains(&retry.jitter) {
        bail!("Invalid config field 'retry.jitter': must be between 0.0 and 1.0");
    }

    Ok(())
}
