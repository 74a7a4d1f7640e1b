use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Suffix the source uses for currency pairs (`EURUSD=X`).
const CURRENCY_SUFFIX: &str = "=X";

/// An instrument symbol as the source spells it.
///
/// Symbols are compared by their exact text. No case folding happens here:
/// the source echoes symbols back verbatim and reconciliation relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Result<Self, FetchError> {
        let symbol = symbol.into();
        if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
            return Err(FetchError::InvalidSymbol(format!("{symbol:?}")));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Currency pairs are served by a different upstream surface and are
    /// rejected by quote retrieval.
    pub fn is_currency(&self) -> bool {
        self.0.ends_with(CURRENCY_SUFFIX)
    }
}

impl FromStr for Symbol {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fails on the first currency symbol. Runs before any cache lookup or request.
pub fn ensure_eligible<'a, I>(symbols: I) -> Result<(), FetchError>
where
    I: IntoIterator<Item = &'a Symbol>,
{
    match symbols.into_iter().find(|s| s.is_currency()) {
        Some(symbol) => Err(FetchError::InvalidSymbol(format!(
            "{symbol}: currency symbols are not supported"
        ))),
        None => Ok(()),
    }
}
