use anyhow::Result;
use std::collections::BTreeMap;
use ticker_fetch::{Security, Symbol};

pub mod json;
#[cfg(feature = "table")]
pub mod table;

/// Every requested symbol in sorted order; `None` marks one the source does
/// not know.
pub type Quotes = BTreeMap<Symbol, Option<Security>>;

pub trait Formatter {
    fn render(&self, quotes: &Quotes) -> Result<String>;
}
