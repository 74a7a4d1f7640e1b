use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ticker")]
#[command(about = "Bulk market quote lookups with request coalescing", long_about = None)]
pub struct Cli {
    /// Path to config file (default: ./ticker.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Print fetch metrics to stderr when done
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Look up quotes for one or more symbols
    Quote {
        /// Symbols to look up (e.g. AAPL MSFT ^GSPC); upper-cased before lookup
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Quote endpoint (overrides TICKER_QUOTE_URL and the config file)
        #[arg(long)]
        quote_url: Option<String>,
    },
    /// Fetch named modules (profile, financials, ...) for one symbol
    Modules {
        /// Symbol to look up; upper-cased before lookup
        symbol: String,
        /// Module name; repeat for several
        #[arg(long = "module", short = 'm', required = true)]
        modules: Vec<String>,
        /// Module endpoint (overrides TICKER_MODULES_URL and the config file)
        #[arg(long)]
        modules_url: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}
