#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ticker_fetch::net::{ReqwestTransport, RetryPolicy, TransportConfig};
use ticker_fetch::{CancellationToken, FetchError, Producer, Symbol};
use tokio::sync::Semaphore;
use wiremock::{Request, Respond, ResponseTemplate};

pub const QUOTE_PATH: &str = "/v7/finance/quote";
pub const MODULES_PATH: &str = "/v10/finance/quoteSummary";

pub fn symbols(list: &[&str]) -> HashSet<Symbol> {
    list.iter().map(|s| Symbol::new(*s).unwrap()).collect()
}

pub fn keys(list: &[&str]) -> HashSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn quote_record(symbol: &str) -> Value {
    json!({
        "symbol": symbol,
        "quoteType": "EQUITY",
        "currency": "USD",
        "longName": format!("{symbol} Holdings"),
        "regularMarketPrice": 101.25,
        "regularMarketTime": 1_700_000_000,
        "fiftyTwoWeekHigh": 130.0
    })
}

pub fn requested_symbols(request: &Request) -> Vec<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == "symbols")
        .map(|(_, v)| v.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

/// Answers a quote request with one record per requested symbol, minus the
/// ones listed in `omit`.
#[derive(Default)]
pub struct EchoQuotes {
    pub omit: HashSet<String>,
    pub delay: Duration,
}

impl EchoQuotes {
    pub fn omitting(list: &[&str]) -> Self {
        Self {
            omit: keys(list),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            omit: HashSet::new(),
            delay,
        }
    }
}

impl Respond for EchoQuotes {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let result: Vec<Value> = requested_symbols(request)
            .iter()
            .filter(|s| !self.omit.contains(*s))
            .map(|s| quote_record(s))
            .collect();

        ResponseTemplate::new(200)
            .set_body_json(json!({ "quoteResponse": { "result": result, "error": null } }))
            .set_delay(self.delay)
    }
}

pub fn fast_transport() -> ReqwestTransport {
    let config = TransportConfig {
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    ReqwestTransport::new(&config).unwrap()
}

/// Producer whose calls block until the test hands out permits.
///
/// Each call records its key set. Values are the 1-based number of the call
/// that produced them. Any key starting with `BAD` fails the whole call.
pub struct GatedProducer {
    calls: Mutex<Vec<HashSet<String>>>,
    permits: Semaphore,
    open: AtomicBool,
}

impl GatedProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            permits: Semaphore::new(0),
            open: AtomicBool::new(false),
        })
    }

    /// A producer that never blocks.
    pub fn open() -> Arc<Self> {
        let producer = Self::new();
        producer.open.store(true, Ordering::SeqCst);
        producer
    }

    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn calls(&self) -> Vec<HashSet<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Producer<String, usize> for GatedProducer {
    async fn produce(
        &self,
        keys: HashSet<String>,
        _cancel: &CancellationToken,
    ) -> Result<HashMap<String, usize>, FetchError> {
        let generation = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(keys.clone());
            calls.len()
        };

        if !self.open.load(Ordering::SeqCst) {
            self.permits.acquire().await.unwrap().forget();
        }

        if keys.iter().any(|k| k.starts_with("BAD")) {
            return Err(FetchError::Upstream("source unavailable".into()));
        }
        Ok(keys.into_iter().map(|k| (k, generation)).collect())
    }
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
