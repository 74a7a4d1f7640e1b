use crate::commands::parse_symbol;
use anyhow::{Context, Result};
use ticker_fetch::{CancellationToken, QuoteClient};
use tracing::warn;

/// Prints the requested modules as one JSON object. Returns `true` when the
/// source answered but the outcome was a module-level error.
pub async fn modules(
    client: &QuoteClient,
    symbol: &str,
    modules: &[String],
    cancel: &CancellationToken,
) -> Result<bool> {
    let symbol = parse_symbol(symbol)?;

    let outcome = client
        .get_modules(&symbol, modules, Some(cancel))
        .await
        .with_context(|| format!("Failed to fetch modules for {symbol}"))?;

    match outcome {
        Ok(set) => {
            println!("{}", serde_json::to_string_pretty(&set)?);
            Ok(false)
        }
        Err(e) => {
            warn!(%symbol, error = %e, "module lookup rejected");
            eprintln!("Error: {e}");
            Ok(true)
        }
    }
}
