use crate::coalesce::Producer;
use crate::error::{upstream_message, FetchError};
use crate::metrics::Metrics;
use crate::net::{ConcurrencyGate, Transport};
use crate::security::Security;
use crate::symbol::{ensure_eligible, Symbol};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

pub const DEFAULT_QUOTE_URL: &str = "https://query2.finance.yahoo.com/v7/finance/quote";
/// Symbols per request. Bounded by what the source accepts in one query string.
pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    error: Option<Value>,
    result: Option<Vec<Value>>,
}

/// Resolves symbol sets against the quote endpoint.
///
/// Every requested symbol comes back in the result map. Symbols the source
/// silently dropped map to `None`.
pub struct QuoteSource {
    transport: Arc<dyn Transport>,
    base_url: Url,
    chunk_size: usize,
    gate: ConcurrencyGate,
    metrics: Option<Arc<Metrics>>,
}

impl QuoteSource {
    pub fn new(transport: Arc<dyn Transport>, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
            chunk_size: DEFAULT_CHUNK_SIZE,
            gate: ConcurrencyGate::new(DEFAULT_MAX_IN_FLIGHT),
            metrics: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.gate = ConcurrencyGate::new(max_in_flight);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn fetch(
        &self,
        symbols: &HashSet<Symbol>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<Symbol, Option<Security>>, FetchError> {
        ensure_eligible(symbols)?;

        let mut results: HashMap<Symbol, Option<Security>> =
            symbols.iter().map(|s| (s.clone(), None)).collect();
        if symbols.is_empty() {
            return Ok(results);
        }

        // Sorted so the same set always produces the same requests.
        let mut ordered: Vec<&Symbol> = symbols.iter().collect();
        ordered.sort_unstable();

        let requests = ordered
            .chunks(self.chunk_size)
            .map(|chunk| self.fetch_chunk(chunk, cancel));

        let chunks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            r = futures::future::try_join_all(requests) => r?,
        };

        for security in chunks.into_iter().flatten() {
            match results.get_mut(&security.symbol) {
                Some(slot) => *slot = Some(security),
                None => {
                    return Err(FetchError::UnexpectedData(format!(
                        "source returned unrequested symbol {}",
                        security.symbol
                    )))
                }
            }
        }

        let found = results.values().filter(|v| v.is_some()).count();
        debug!(requested = results.len(), found, "quote batch resolved");
        Ok(results)
    }

    /// `base?symbols=A,B,C`, each symbol percent-encoded on its own so the
    /// separating commas stay literal.
    pub fn chunk_url(&self, chunk: &[&Symbol]) -> Url {
        let joined = chunk
            .iter()
            .map(|s| form_urlencoded::byte_serialize(s.as_str().as_bytes()).collect::<String>())
            .collect::<Vec<_>>()
            .join(",");

        let mut url = self.base_url.clone();
        url.set_query(Some(&format!("symbols={joined}")));
        url
    }

    async fn fetch_chunk(
        &self,
        chunk: &[&Symbol],
        cancel: &CancellationToken,
    ) -> Result<Vec<Security>, FetchError> {
        let url = self.chunk_url(chunk);
        let _permit = self.gate.acquire(self.metrics.as_deref()).await?;

        if let Some(m) = &self.metrics {
            Metrics::incr(&m.chunk_requests);
        }
        debug!(symbols = chunk.len(), "requesting quote chunk");

        let start = Instant::now();
        let document = self.transport.get_json(&url, cancel).await?;
        if let Some(m) = &self.metrics {
            m.time_upstream_ms
                .fetch_add(start.elapsed().as_millis() as u64, Ordering::Relaxed);
        }

        parse_quote_response(document)
    }
}

fn parse_quote_response(document: Value) -> Result<Vec<Security>, FetchError> {
    let envelope: QuoteEnvelope = serde_json::from_value(document)
        .map_err(|e| FetchError::UnexpectedData(format!("quote response: {e}")))?;
    let response = envelope.quote_response;

    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        let message = upstream_message(&error);
        warn!(error = %message, "source rejected quote request");
        return Err(FetchError::Upstream(message));
    }

    let records = response.result.ok_or_else(|| {
        FetchError::UnexpectedData("quote response has no result array".to_string())
    })?;

    records.into_iter().map(Security::decode).collect()
}

#[async_trait]
impl Producer<Symbol, Option<Security>> for QuoteSource {
    async fn produce(
        &self,
        keys: HashSet<Symbol>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<Symbol, Option<Security>>, FetchError> {
        self.fetch(&keys, cancel).await
    }
}
