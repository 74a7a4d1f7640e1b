mod helpers;

use helpers::{keys, wait_until, GatedProducer};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use ticker_fetch::{CancellationToken, Coalescer, ExpiringStore, FetchError, ManualClock, Metrics};
use tokio::task::JoinHandle;

type GetResult = Result<HashMap<String, usize>, Arc<FetchError>>;

fn coalescer(producer: &Arc<GatedProducer>) -> Arc<Coalescer<String, usize>> {
    let store = ExpiringStore::new(Duration::from_secs(60));
    Arc::new(Coalescer::new(store, producer.clone()))
}

fn spawn_get(coalescer: &Arc<Coalescer<String, usize>>, list: &[&str]) -> JoinHandle<GetResult> {
    let c = coalescer.clone();
    let k = keys(list);
    tokio::spawn(async move { c.get(&k, &CancellationToken::new()).await })
}

#[tokio::test]
async fn concurrent_overlapping_requests_share_one_producer_call() {
    let producer = GatedProducer::new();
    let metrics = Arc::new(Metrics::new());
    let store = ExpiringStore::new(Duration::from_secs(60));
    let c = Arc::new(Coalescer::new(store, producer.clone()).with_metrics(metrics.clone()));

    // Keep the gate busy so every caller below queues before any drain.
    let warm = spawn_get(&c, &["WARM"]);
    wait_until(|| producer.call_count() == 1).await;

    let requests: [&[&str]; 4] = [&["A", "B"], &["B", "C"], &["C", "D", "A"], &["D"]];
    let total: usize = requests.iter().map(|r| r.len()).sum();
    let handles: Vec<_> = requests.iter().map(|r| spawn_get(&c, r)).collect();
    wait_until(|| c.pending_len() == total).await;

    producer.release(10);
    assert_eq!(warm.await.unwrap().unwrap()["WARM"], 1);

    for (handle, requested) in handles.into_iter().zip(requests) {
        let values = handle.await.unwrap().unwrap();
        assert_eq!(values.keys().cloned().collect::<HashSet<_>>(), keys(requested));
        assert!(values.values().all(|generation| *generation == 2));
    }

    assert_eq!(producer.call_count(), 2);
    assert_eq!(producer.calls()[1], keys(&["A", "B", "C", "D"]));

    let snap = metrics.snapshot();
    assert_eq!(snap.producer_calls, 2);
    assert_eq!(snap.coalesced_waiters, 3);
}

#[tokio::test]
async fn fresh_entries_are_served_without_the_producer() {
    let producer = GatedProducer::open();
    let c = coalescer(&producer);
    let cancel = CancellationToken::new();

    let all = c.get(&keys(&["A", "B", "C"]), &cancel).await.unwrap();
    let subset = c.get(&keys(&["A", "B"]), &cancel).await.unwrap();

    assert_eq!(producer.call_count(), 1);
    assert_eq!(subset.len(), 2);
    for (k, v) in &subset {
        assert_eq!(all[k], *v);
    }
}

#[tokio::test]
async fn expired_key_triggers_exactly_one_refetch() {
    let producer = GatedProducer::open();
    let clock = Arc::new(ManualClock::new());
    let store = ExpiringStore::with_clock(Duration::from_secs(60), clock.clone());
    let c = Coalescer::new(store, producer.clone());
    let cancel = CancellationToken::new();
    let aapl = keys(&["AAPL"]);

    assert_eq!(c.get(&aapl, &cancel).await.unwrap()["AAPL"], 1);
    clock.advance(Duration::from_secs(59));
    assert_eq!(c.get(&aapl, &cancel).await.unwrap()["AAPL"], 1);
    assert_eq!(producer.call_count(), 1);

    clock.advance(Duration::from_secs(1));
    assert_eq!(c.get(&aapl, &cancel).await.unwrap()["AAPL"], 2);
    assert_eq!(c.get(&aapl, &cancel).await.unwrap()["AAPL"], 2);
    assert_eq!(producer.call_count(), 2);
}

#[tokio::test]
async fn partial_miss_refetches_the_whole_request() {
    let producer = GatedProducer::open();
    let c = coalescer(&producer);
    let cancel = CancellationToken::new();

    c.get(&keys(&["A"]), &cancel).await.unwrap();
    c.get(&keys(&["A", "B"]), &cancel).await.unwrap();

    assert_eq!(producer.calls()[1], keys(&["A", "B"]));
}

#[tokio::test]
async fn failed_batch_fails_every_waiter_and_caches_nothing() {
    let producer = GatedProducer::new();
    let c = coalescer(&producer);

    let warm = spawn_get(&c, &["WARM"]);
    wait_until(|| producer.call_count() == 1).await;

    let requests: [&[&str]; 3] = [&["A", "BAD"], &["A", "B"], &["C"]];
    let handles: Vec<_> = requests.iter().map(|r| spawn_get(&c, r)).collect();
    wait_until(|| c.pending_len() == 5).await;

    producer.release(10);
    warm.await.unwrap().unwrap();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(*err, FetchError::Upstream(_)), "got {err}");
    }
    assert_eq!(producer.call_count(), 2);
    assert!(c.store().get(&keys(&["A", "B", "C", "BAD"])).is_empty());

    // No failure is remembered: the next lookup goes back to the producer.
    let values = c.get(&keys(&["A"]), &CancellationToken::new()).await.unwrap();
    assert_eq!(values["A"], 3);
    assert_eq!(producer.call_count(), 3);
}

#[tokio::test]
async fn cancelled_waiter_leaves_its_keys_for_the_next_batch() {
    let producer = GatedProducer::new();
    let c = coalescer(&producer);

    let warm = spawn_get(&c, &["WARM"]);
    wait_until(|| producer.call_count() == 1).await;

    let cancel = CancellationToken::new();
    let waiter = {
        let c = c.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { c.get(&keys(&["X"]), &cancel).await })
    };
    wait_until(|| c.pending_len() == 1).await;

    cancel.cancel();
    let err = waiter.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());

    producer.release(10);
    warm.await.unwrap().unwrap();
    assert_eq!(c.pending_len(), 1);

    c.get(&keys(&["Z"]), &CancellationToken::new()).await.unwrap();
    assert_eq!(producer.calls()[1], keys(&["X", "Z"]));
}

#[tokio::test]
async fn dropped_drainer_does_not_strand_its_window() {
    let producer = GatedProducer::new();
    let c = coalescer(&producer);

    let warm = spawn_get(&c, &["WARM"]);
    wait_until(|| producer.call_count() == 1).await;

    // Same window for both; the first queued on the gate drains it.
    let drainer = spawn_get(&c, &["X"]);
    wait_until(|| c.pending_len() == 1).await;
    let joiner = spawn_get(&c, &["Y"]);
    wait_until(|| c.pending_len() == 2).await;

    producer.release(1);
    warm.await.unwrap().unwrap();
    wait_until(|| producer.call_count() == 2).await;

    drainer.abort();
    let err = joiner.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(producer.calls()[1], keys(&["X", "Y"]));
}

#[tokio::test]
async fn empty_request_never_reaches_the_producer() {
    let producer = GatedProducer::open();
    let c = coalescer(&producer);

    let values = c.get(&HashSet::new(), &CancellationToken::new()).await.unwrap();
    assert!(values.is_empty());
    assert_eq!(producer.call_count(), 0);
}
