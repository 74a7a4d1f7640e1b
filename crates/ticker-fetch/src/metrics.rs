use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct Metrics {
    pub start_time: Option<Instant>,

    // Time (in milliseconds)
    pub time_upstream_ms: AtomicU64,

    // Counts
    pub producer_calls: AtomicU64,
    pub chunk_requests: AtomicU64,
    pub module_requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub coalesced_waiters: AtomicU64,
    pub retries: AtomicU64,
    pub max_concurrency: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            time_upstream_ms: self.time_upstream_ms.load(Ordering::Relaxed),

            producer_calls: self.producer_calls.load(Ordering::Relaxed),
            chunk_requests: self.chunk_requests.load(Ordering::Relaxed),
            module_requests: self.module_requests.load(Ordering::Relaxed),

            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),

            coalesced_waiters: self.coalesced_waiters.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            max_concurrency: self.max_concurrency.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_concurrency(&self, current: u64) {
        let mut max = self.max_concurrency.load(Ordering::Relaxed);
        while current > max {
            match self.max_concurrency.compare_exchange_weak(
                max,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub time_upstream_ms: u64,

    pub producer_calls: u64,
    pub chunk_requests: u64,
    pub module_requests: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,

    pub coalesced_waiters: u64,
    pub retries: u64,
    pub max_concurrency: u64,
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        let total = self
            .start_time
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or_default();

        writeln!(f, "Fetch Metrics:")?;
        writeln!(f, "  Time:")?;
        writeln!(f, "    Total:       {}ms", total)?;
        writeln!(f, "    Upstream:    {}ms", snap.time_upstream_ms)?;
        writeln!(f, "  Counts:")?;
        writeln!(
            f,
            "    Requests:    {} (Quote chunks) + {} (Modules)",
            snap.chunk_requests, snap.module_requests
        )?;
        writeln!(f, "    Batches:     {}", snap.producer_calls)?;
        writeln!(
            f,
            "    Cache:       {} hit, {} miss",
            snap.cache_hits, snap.cache_misses
        )?;
        writeln!(f, "    Coalesced:   {}", snap.coalesced_waiters)?;
        writeln!(f, "    Retries:     {}", snap.retries)?;
        writeln!(f, "    Max Concurr: {}", snap.max_concurrency)?;
        Ok(())
    }
}
