use crate::error::FetchError;
use crate::metrics::Metrics;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of requests in flight at once.
#[derive(Clone)]
pub struct ConcurrencyGate {
    sem: Arc<Semaphore>,
    in_flight: Arc<AtomicU64>,
}

/// Held for the duration of one request.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicU64>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyGate {
    pub fn new(max_in_flight: usize) -> Self {
        let n = max_in_flight.max(1);
        Self {
            sem: Arc::new(Semaphore::new(n)),
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    pub async fn acquire(&self, metrics: Option<&Metrics>) -> Result<GatePermit, FetchError> {
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Internal("concurrency gate closed".into()))?;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(m) = metrics {
            m.observe_concurrency(current);
        }

        Ok(GatePermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }
}
