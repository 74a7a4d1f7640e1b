use crate::formatters::{Formatter, Quotes};
use anyhow::Result;

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn render(&self, quotes: &Quotes) -> Result<String> {
        Ok(serde_json::to_string_pretty(quotes)?)
    }
}
