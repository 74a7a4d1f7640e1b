use anyhow::Result;
use ticker_fetch::Symbol;

pub mod modules;
pub mod quote;

/// Symbols are matched case-sensitively upstream, where tickers are upper
/// case; command-line input is normalized to match.
pub fn parse_symbol(raw: &str) -> Result<Symbol> {
    Ok(raw.trim().to_uppercase().parse()?)
}
