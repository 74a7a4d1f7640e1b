use super::retry::{parse_retry_after, RetryPolicy, RetryRunner};
use super::sleeper::Sleeper;
use crate::error::FetchError;
use crate::metrics::Metrics;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Fetches one JSON document. The only seam between the pipeline and the
/// network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &Url, cancel: &CancellationToken) -> Result<Value, FetchError>;
}

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("ticker/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    request_timeout: Duration,
    retry: RetryRunner,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            retry: RetryRunner::new(config.retry.clone()),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.retry = self.retry.with_sleeper(sleeper);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.retry = self.retry.with_metrics(metrics);
        self
    }

    async fn send_once(&self, url: &Url) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::http_status(status, body, retry_after));
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| FetchError::UnexpectedData(format!("response is not JSON: {e}")))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_json(&self, url: &Url, cancel: &CancellationToken) -> Result<Value, FetchError> {
        debug!(%url, "GET");
        self.retry.run(cancel, |_| self.send_once(url)).await
    }
}
