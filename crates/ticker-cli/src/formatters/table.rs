use crate::formatters::{Formatter, Quotes};
use anyhow::Result;
use prettytable::{format, Cell, Row, Table};

pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn render(&self, quotes: &Quotes) -> Result<String> {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);

        table.set_titles(Row::new(vec![
            Cell::new("Symbol").style_spec("b"),
            Cell::new("Name").style_spec("b"),
            Cell::new("Price").style_spec("b"),
            Cell::new("Change %").style_spec("b"),
            Cell::new("Currency").style_spec("b"),
            Cell::new("Exchange").style_spec("b"),
        ]));

        for (symbol, quote) in quotes {
            let Some(q) = quote else {
                table.add_row(Row::new(vec![
                    Cell::new(symbol.as_str()),
                    Cell::new("(not found)").style_spec("Fy"),
                ]));
                continue;
            };

            let name = q.display_name();
            let name = if name.chars().count() > 32 {
                format!("{}...", name.chars().take(32).collect::<String>())
            } else {
                name.to_string()
            };

            let change = q.regular_market_change_percent;
            let change_style = match change {
                Some(c) if c < 0.0 => "Fr",
                Some(c) if c > 0.0 => "Fg",
                _ => "",
            };

            table.add_row(Row::new(vec![
                Cell::new(symbol.as_str()),
                Cell::new(&name),
                Cell::new(&fmt_opt(q.regular_market_price, |p| format!("{p:.2}"))),
                Cell::new(&fmt_opt(change, |c| format!("{c:+.2}"))).style_spec(change_style),
                Cell::new(q.currency.as_deref().unwrap_or("-")),
                Cell::new(q.exchange.as_deref().unwrap_or("-")),
            ]));
        }

        Ok(table.to_string())
    }
}

fn fmt_opt<T>(value: Option<T>, f: impl Fn(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ticker_fetch::{Security, Symbol};

    #[test]
    fn test_table_marks_missing_symbols() {
        let msft = Security::decode(json!({
            "symbol": "MSFT",
            "shortName": "Microsoft",
            "regularMarketPrice": 410.0,
            "regularMarketChangePercent": -1.234,
            "currency": "USD"
        }))
        .unwrap();

        let mut quotes = Quotes::new();
        quotes.insert(Symbol::new("MSFT").unwrap(), Some(msft));
        quotes.insert(Symbol::new("ZZZZ").unwrap(), None);

        let out = TableFormatter.render(&quotes).unwrap();
        assert!(out.contains("Microsoft"));
        assert!(out.contains("410.00"));
        assert!(out.contains("-1.23"));
        assert!(out.contains("(not found)"));
    }
}
