use crate::error::FetchError;
use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded quote record.
///
/// The commonly used fields are typed; everything else the source sends is
/// kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub symbol: Symbol,
    pub quote_type: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub market_state: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_change_percent: Option<f64>,
    pub regular_market_volume: Option<u64>,
    /// Epoch seconds.
    pub regular_market_time: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Security {
    pub fn decode(record: Value) -> Result<Self, FetchError> {
        serde_json::from_value(record)
            .map_err(|e| FetchError::UnexpectedData(format!("quote record: {e}")))
    }

    /// Best display name: long name, then short name, then the symbol.
    pub fn display_name(&self) -> &str {
        self.long_name
            .as_deref()
            .or(self.short_name.as_deref())
            .unwrap_or(self.symbol.as_str())
    }
}
