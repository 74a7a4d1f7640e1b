use crate::error::FetchError;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Waits out a retry delay. Returns `Cancelled` as soon as `cancel` fires,
/// whether before or during the wait.
#[async_trait]
pub trait Sleeper: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), FetchError>;
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Records requested delays without waiting. A delay requested after
/// cancellation is not recorded.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn tokio_sleeper_wakes_on_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = TokioSleeper
            .sleep(Duration::from_secs(30), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn tokio_sleeper_completes_without_cancel() {
        let cancel = CancellationToken::new();
        assert!(TokioSleeper
            .sleep(Duration::from_millis(5), &cancel)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn recording_sleeper_skips_cancelled_waits() {
        let sleeper = RecordingSleeper::new();
        let cancel = CancellationToken::new();

        sleeper.sleep(Duration::from_millis(100), &cancel).await.unwrap();
        cancel.cancel();
        assert!(sleeper
            .sleep(Duration::from_millis(200), &cancel)
            .await
            .is_err());

        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(100)]);
    }
}
