use crate::clock::{Clock, SystemClock};
use crate::coalesce::Coalescer;
use crate::error::FetchError;
use crate::metrics::Metrics;
use crate::modules::{ModuleResult, ModuleSource, DEFAULT_MODULES_URL};
use crate::net::{ReqwestTransport, Transport, TransportConfig};
use crate::quotes::{QuoteSource, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_IN_FLIGHT, DEFAULT_QUOTE_URL};
use crate::security::Security;
use crate::store::ExpiringStore;
use crate::symbol::{ensure_eligible, Symbol};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub quote_url: String,
    pub modules_url: String,
    pub chunk_size: usize,
    pub max_in_flight: usize,
    pub ttl: Duration,
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            quote_url: DEFAULT_QUOTE_URL.to_string(),
            modules_url: DEFAULT_MODULES_URL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            ttl: DEFAULT_TTL,
            transport: TransportConfig::default(),
        }
    }
}

/// Entry point: cached, coalesced quote lookups plus uncached module lookups.
///
/// One instance owns one cache. Share it (`Arc<QuoteClient>`) between tasks
/// to get coalescing across them.
pub struct QuoteClient {
    quotes: Coalescer<Symbol, Option<Security>>,
    modules: ModuleSource,
    metrics: Arc<Metrics>,
}

impl QuoteClient {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let metrics = Arc::new(Metrics::new());
        let transport =
            ReqwestTransport::new(&config.transport)?.with_metrics(metrics.clone());
        Self::build(config, Arc::new(transport), Arc::new(SystemClock), metrics)
    }

    /// For testing: inject the transport and the clock.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FetchError> {
        Self::build(config, transport, clock, Arc::new(Metrics::new()))
    }

    fn build(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, FetchError> {
        let quote_url = Url::parse(&config.quote_url)?;
        let modules_url = Url::parse(&config.modules_url)?;

        let source = QuoteSource::new(transport.clone(), quote_url)
            .with_chunk_size(config.chunk_size)
            .with_max_in_flight(config.max_in_flight)
            .with_metrics(metrics.clone());
        let store = ExpiringStore::with_clock(config.ttl, clock);
        let quotes = Coalescer::new(store, Arc::new(source)).with_metrics(metrics.clone());

        let modules = ModuleSource::new(transport, modules_url).with_metrics(metrics.clone());

        Ok(Self {
            quotes,
            modules,
            metrics,
        })
    }

    /// Quotes for every symbol in `symbols`. A symbol the source does not
    /// know maps to `None`. Currency symbols fail the whole call up front.
    pub async fn get_quotes(
        &self,
        symbols: &HashSet<Symbol>,
        cancel: Option<&CancellationToken>,
    ) -> Result<HashMap<Symbol, Option<Security>>, Arc<FetchError>> {
        ensure_eligible(symbols).map_err(Arc::new)?;
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let cancel = cancel.cloned().unwrap_or_else(CancellationToken::new);
        self.quotes.get(symbols, &cancel).await
    }

    pub async fn get_quote(
        &self,
        symbol: &Symbol,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Security>, Arc<FetchError>> {
        let symbols = HashSet::from([symbol.clone()]);
        let mut quotes = self.get_quotes(&symbols, cancel).await?;
        Ok(quotes.remove(symbol).flatten())
    }

    pub async fn get_modules<S: AsRef<str>>(
        &self,
        symbol: &Symbol,
        modules: &[S],
        cancel: Option<&CancellationToken>,
    ) -> Result<ModuleResult, FetchError> {
        let cancel = cancel.cloned().unwrap_or_else(CancellationToken::new);
        self.modules.fetch(symbol, modules, &cancel).await
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Drops expired cache entries; lookups never need this.
    pub fn purge_expired(&self) -> usize {
        self.quotes.store().purge_expired()
    }
}
