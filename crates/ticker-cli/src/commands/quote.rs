use crate::cli::OutputFormat;
use crate::commands::parse_symbol;
use crate::formatters::json::JsonFormatter;
use crate::formatters::{Formatter, Quotes};
use anyhow::{Context, Result};
use std::collections::HashSet;
use ticker_fetch::{CancellationToken, QuoteClient};
use tracing::info;

/// Prints quotes for `symbols`. Returns `true` when at least one symbol was
/// not found.
pub async fn quote(
    client: &QuoteClient,
    symbols: &[String],
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<bool> {
    let requested = symbols
        .iter()
        .map(|s| parse_symbol(s))
        .collect::<Result<HashSet<_>>>()?;

    let found = client
        .get_quotes(&requested, Some(cancel))
        .await
        .with_context(|| format!("Failed to fetch quotes for {} symbol(s)", requested.len()))?;

    let quotes: Quotes = found.into_iter().collect();
    let missing: Vec<&str> = quotes
        .iter()
        .filter(|(_, q)| q.is_none())
        .map(|(s, _)| s.as_str())
        .collect();
    if !missing.is_empty() {
        info!(symbols = ?missing, "source does not know some symbols");
    }

    let rendered = match format {
        OutputFormat::Json => JsonFormatter.render(&quotes)?,
        #[cfg(feature = "table")]
        OutputFormat::Table => crate::formatters::table::TableFormatter.render(&quotes)?,
        #[cfg(not(feature = "table"))]
        OutputFormat::Table => {
            anyhow::bail!("Table output requires the 'table' feature. Rebuild with --features table.")
        }
    };
    println!("{rendered}");

    Ok(!missing.is_empty())
}
