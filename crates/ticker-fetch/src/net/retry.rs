use super::sleeper::{Sleeper, TokioSleeper};
use crate::error::FetchError;
use crate::metrics::Metrics;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    RetryAfter(Duration),
    Backoff,
    Fatal,
}

pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let v = headers.get("retry-after")?.to_str().ok()?;
    let secs: u64 = v.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}

pub fn classify_status(status: u16, retry_after: Option<Duration>) -> RetryClass {
    if status == 429 || status == 503 {
        return match retry_after {
            Some(d) => RetryClass::RetryAfter(d),
            None => RetryClass::Backoff,
        };
    }

    if status == 408 || (500..600).contains(&status) {
        return RetryClass::Backoff;
    }

    RetryClass::Fatal
}

/// Only transport-level trouble is retried. Upstream-reported errors and
/// malformed documents are final.
pub fn classify_error(err: &FetchError) -> RetryClass {
    match err {
        FetchError::HttpStatus {
            status,
            retry_after,
            ..
        } => classify_status(*status, *retry_after),
        FetchError::Http(e) if e.is_builder() || e.is_decode() => RetryClass::Fatal,
        FetchError::Http(_) => RetryClass::Backoff,
        _ => RetryClass::Fatal,
    }
}

pub fn backoff_delay(policy: &RetryPolicy, attempt: usize) -> Duration {
    let pow = 1u32
        .checked_shl((attempt.saturating_sub(1)) as u32)
        .unwrap_or(u32::MAX);
    let raw = policy.base_delay.saturating_mul(pow);
    let capped = raw.min(policy.max_delay);
    apply_jitter(capped, policy.jitter_factor)
}

fn apply_jitter(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }

    let nanos = delay.as_nanos() as f64;
    let span = nanos * jitter_factor; // ±span
    let offset = (rand::random::<f64>() * 2.0 - 1.0) * span;
    let out = (nanos + offset).max(0.0);
    Duration::from_nanos(out as u64)
}

#[derive(Clone)]
pub struct RetryRunner {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    metrics: Option<Arc<Metrics>>,
}

impl RetryRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
            metrics: None,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `f` until it succeeds, fails fatally, or attempts run out.
    /// Attempts are numbered from 1.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut f: F) -> Result<T, FetchError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                r = f(attempt) => r,
            };

            let err = match result {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            let delay = match classify_error(&err) {
                RetryClass::Fatal => return Err(err),
                _ if attempt >= max_attempts => return Err(err),
                RetryClass::RetryAfter(d) => d.min(self.policy.max_delay),
                RetryClass::Backoff => backoff_delay(&self.policy, attempt),
            };

            warn!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying request");
            if let Some(m) = &self.metrics {
                Metrics::incr(&m.retries);
            }

            self.sleeper.sleep(delay, cancel).await?;
            attempt += 1;
        }
    }
}
