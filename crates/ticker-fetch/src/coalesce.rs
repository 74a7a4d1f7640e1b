use crate::error::FetchError;
use crate::metrics::Metrics;
use crate::store::ExpiringStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Performs the real bulk fetch for a deduplicated key set.
///
/// Implementations must return at most one value per key. Keys they leave
/// out simply do not get a cache entry.
#[async_trait]
pub trait Producer<K, V>: Send + Sync {
    async fn produce(
        &self,
        keys: HashSet<K>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<K, V>, FetchError>;
}

type WindowOutcome = Result<(), Arc<FetchError>>;

/// One generation of pending keys. Resolved exactly once, by the caller that
/// drains it.
#[derive(Default)]
struct BatchWindow {
    outcome: OnceLock<WindowOutcome>,
}

struct Pending<K> {
    keys: Vec<K>,
    window: Arc<BatchWindow>,
}

impl<K> Pending<K> {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            window: Arc::default(),
        }
    }
}

/// Resolves the drained window as cancelled if the draining caller is
/// dropped before the producer finishes.
struct WindowResolver {
    window: Arc<BatchWindow>,
}

impl WindowResolver {
    fn resolve(&self, outcome: WindowOutcome) {
        let _ = self.window.outcome.set(outcome);
    }
}

impl Drop for WindowResolver {
    fn drop(&mut self) {
        let _ = self
            .window
            .outcome
            .set(Err(Arc::new(FetchError::Cancelled)));
    }
}

/// Turns concurrent, overlapping lookups into as few producer calls as
/// possible.
///
/// Callers that miss the cache append their keys to a shared pending buffer,
/// then queue on the producer gate. Whoever gets through first drains the
/// whole buffer and runs the producer once for the union. Everyone whose keys
/// were in that drain shares its outcome.
///
/// Two locks, never nested: `pending` guards the buffer and is only held for
/// an append or a swap; `gate` is held for the full producer call.
pub struct Coalescer<K, V> {
    store: ExpiringStore<K, V>,
    producer: Arc<dyn Producer<K, V>>,
    pending: Mutex<Pending<K>>,
    gate: tokio::sync::Mutex<()>,
    metrics: Option<Arc<Metrics>>,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: ExpiringStore<K, V>, producer: Arc<dyn Producer<K, V>>) -> Self {
        Self {
            store,
            producer,
            pending: Mutex::new(Pending::new()),
            gate: tokio::sync::Mutex::new(()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &ExpiringStore<K, V> {
        &self.store
    }

    /// Number of keys waiting for the next producer call.
    pub fn pending_len(&self) -> usize {
        self.lock_pending().keys.len()
    }

    pub async fn get(
        &self,
        keys: &HashSet<K>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<K, V>, Arc<FetchError>> {
        if let Some(values) = self.store.try_get_all(keys) {
            if let Some(m) = &self.metrics {
                Metrics::incr(&m.cache_hits);
            }
            debug!(keys = keys.len(), "served from cache");
            return Ok(values);
        }
        if let Some(m) = &self.metrics {
            Metrics::incr(&m.cache_misses);
        }

        // Every key of the request is queued, including ones that were
        // still fresh.
        let window = self.enqueue(keys);

        let _admitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Arc::new(FetchError::Cancelled)),
            guard = self.gate.lock() => guard,
        };

        match window.outcome.get() {
            Some(Ok(())) => {
                if let Some(m) = &self.metrics {
                    Metrics::incr(&m.coalesced_waiters);
                }
                debug!(keys = keys.len(), "joined a completed batch");
            }
            Some(Err(e)) => return Err(e.clone()),
            None => self.run_batch(cancel).await?,
        }

        Ok(self.store.get(keys))
    }

    fn enqueue(&self, keys: &HashSet<K>) -> Arc<BatchWindow> {
        let mut pending = self.lock_pending();
        pending.keys.extend(keys.iter().cloned());
        pending.window.clone()
    }

    fn drain(&self) -> Pending<K> {
        mem::replace(&mut *self.lock_pending(), Pending::new())
    }

    /// Runs with the gate held.
    async fn run_batch(&self, cancel: &CancellationToken) -> WindowOutcome {
        let Pending { keys, window } = self.drain();
        let resolver = WindowResolver { window };

        let batch: HashSet<K> = keys.into_iter().collect();
        let outcome = if batch.is_empty() {
            Ok(())
        } else {
            if let Some(m) = &self.metrics {
                Metrics::incr(&m.producer_calls);
            }
            debug!(keys = batch.len(), "invoking producer");
            match self.producer.produce(batch, cancel).await {
                Ok(values) => {
                    self.store.save(values);
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "batch fetch failed");
                    Err(Arc::new(e))
                }
            }
        };

        resolver.resolve(outcome.clone());
        outcome
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending<K>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
