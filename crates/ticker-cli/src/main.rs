mod cli;
mod commands;
mod config_loader;
mod formatters;

use clap::Parser;
use cli::{Cli, Commands};
use config_loader::{load_effective_config, to_client_config, Overrides};
use std::process::exit;
use ticker_fetch::{CancellationToken, QuoteClient};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        exit(0);
    };

    let overrides = match command {
        Commands::Quote { quote_url, .. } => Overrides {
            quote_url: quote_url.clone(),
            ..Overrides::default()
        },
        Commands::Modules { modules_url, .. } => Overrides {
            modules_url: modules_url.clone(),
            ..Overrides::default()
        },
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let cancel = CancellationToken::new();

    let result = runtime.block_on(async {
        let config = load_effective_config(cli.config.as_ref(), &overrides)?;
        debug!(?config, "effective configuration");
        let client = QuoteClient::new(to_client_config(&config))?;

        // Ctrl+C cancels in-flight requests instead of killing the process.
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        let outcome = match command {
            Commands::Quote {
                symbols, format, ..
            } => commands::quote::quote(&client, symbols, *format, &cancel).await,
            Commands::Modules {
                symbol, modules, ..
            } => commands::modules::modules(&client, symbol, modules, &cancel).await,
        };

        if cli.metrics {
            eprint!("{}", client.metrics());
        }
        outcome
    });

    match result {
        Ok(partial) => exit(if partial { 1 } else { 0 }),
        Err(_) if cancel.is_cancelled() => {
            eprintln!("Interrupted.");
            exit(130);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit(2);
        }
    }
}
