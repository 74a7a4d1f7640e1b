//! Per-symbol module retrieval (profile, financials, ...).
//!
//! Unlike quotes this endpoint is neither cached nor coalesced. Outcomes the
//! caller is expected to handle come back as [`ModuleError`] inside an `Ok`;
//! a document that does not have the promised shape is a hard
//! [`FetchError::UnexpectedData`].

use crate::error::{upstream_message, FetchError};
use crate::metrics::Metrics;
use crate::net::Transport;
use crate::symbol::Symbol;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::{form_urlencoded, Url};

pub const DEFAULT_MODULES_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("no modules requested")]
    Empty,

    #[error("module name is empty")]
    EmptyName,

    #[error("duplicate module: {0}")]
    Duplicate(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("unexpected extra modules: {}", .0.join(", "))]
    Extra(Vec<String>),

    #[error("missing modules: {}", .0.join(", "))]
    Missing(Vec<String>),
}

/// Module name to its raw document.
pub type ModuleSet = BTreeMap<String, Value>;
pub type ModuleResult = Result<ModuleSet, ModuleError>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryResponse,
}

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    error: Option<Value>,
    result: Option<Vec<Map<String, Value>>>,
}

pub struct ModuleSource {
    transport: Arc<dyn Transport>,
    base_url: Url,
    metrics: Option<Arc<Metrics>>,
}

impl ModuleSource {
    pub fn new(transport: Arc<dyn Transport>, base_url: Url) -> Self {
        Self {
            transport,
            base_url,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn fetch<S: AsRef<str>>(
        &self,
        symbol: &Symbol,
        modules: &[S],
        cancel: &CancellationToken,
    ) -> Result<ModuleResult, FetchError> {
        let requested = match validate_modules(modules) {
            Ok(names) => names,
            Err(e) => return Ok(Err(e)),
        };

        let url = self.module_url(symbol, &requested)?;
        if let Some(m) = &self.metrics {
            Metrics::incr(&m.module_requests);
        }
        debug!(%symbol, modules = requested.len(), "requesting modules");

        let document = self.transport.get_json(&url, cancel).await?;
        let returned = match parse_summary(document)? {
            Ok(modules) => modules,
            Err(e) => return Ok(Err(e)),
        };

        Ok(reconcile(&requested, returned))
    }

    pub fn module_url(&self, symbol: &Symbol, modules: &[String]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::Internal(format!("module endpoint {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .push(symbol.as_str());

        let joined = modules
            .iter()
            .map(|m| form_urlencoded::byte_serialize(m.as_bytes()).collect::<String>())
            .collect::<Vec<_>>()
            .join(",");
        url.set_query(Some(&format!("modules={joined}")));
        Ok(url)
    }
}

/// Rejects empty lists, blank names and duplicates. Keeps request order.
pub fn validate_modules<S: AsRef<str>>(modules: &[S]) -> Result<Vec<String>, ModuleError> {
    if modules.is_empty() {
        return Err(ModuleError::Empty);
    }

    let mut seen = HashSet::with_capacity(modules.len());
    let mut names = Vec::with_capacity(modules.len());
    for module in modules {
        let name = module.as_ref().trim();
        if name.is_empty() {
            return Err(ModuleError::EmptyName);
        }
        if !seen.insert(name) {
            return Err(ModuleError::Duplicate(name.to_string()));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

fn parse_summary(document: Value) -> Result<Result<Map<String, Value>, ModuleError>, FetchError> {
    let envelope: SummaryEnvelope = serde_json::from_value(document)
        .map_err(|e| FetchError::UnexpectedData(format!("module response: {e}")))?;
    let response = envelope.quote_summary;

    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        return Ok(Err(ModuleError::Upstream(upstream_message(&error))));
    }

    let mut results = response.result.ok_or_else(|| {
        FetchError::UnexpectedData("module response has no result array".to_string())
    })?;

    match results.len() {
        0 => Ok(Ok(Map::new())),
        1 => Ok(Ok(results.remove(0))),
        n => Err(FetchError::UnexpectedData(format!(
            "module response has {n} results for one symbol"
        ))),
    }
}

/// The source must return exactly what was asked for.
fn reconcile(requested: &[String], returned: Map<String, Value>) -> ModuleResult {
    let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();

    let mut extra: Vec<String> = returned
        .keys()
        .filter(|name| !wanted.contains(name.as_str()))
        .cloned()
        .collect();
    if !extra.is_empty() {
        extra.sort();
        return Err(ModuleError::Extra(extra));
    }

    let missing: Vec<String> = requested
        .iter()
        .filter(|name| !returned.contains_key(name.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ModuleError::Missing(missing));
    }

    Ok(returned.into_iter().collect())
}
