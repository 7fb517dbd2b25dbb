//! Concurrent use of the registry and of a single breaker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use dependency_breaker::config::BreakerSettings;
use dependency_breaker::resilience::{BreakerConfig, CircuitState};

mod common;
use common::{DependencyError, Harness, Invocations};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_yields_one_instance() {
    let h = Harness::new(BreakerSettings::default());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let registry = h.registry.clone();
        handles.push(tokio::spawn(async move {
            registry.get_or_create("ads-api", BreakerConfig::new("ads-api"))
        }));
    }

    let mut breakers = Vec::new();
    for handle in handles {
        breakers.push(handle.await.unwrap());
    }

    assert_eq!(h.registry.len(), 1);
    assert!(breakers.iter().all(|b| Arc::ptr_eq(b, &breakers[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_calls_on_one_breaker_are_serialized() {
    let h = Harness::new(BreakerSettings::default());
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let breaker = h.registry.breaker("crm");
        let in_flight = in_flight.clone();
        let max_in_flight = max_in_flight.clone();
        handles.push(tokio::spawn(async move {
            breaker
                .call(|| async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, DependencyError>(())
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    let m = h.registry.breaker("crm").metrics();
    assert_eq!(m.total_requests, 50);
    assert_eq!(m.successful_requests, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_open_exactly_once() {
    let mut settings = BreakerSettings::default();
    settings.defaults.failure_threshold = 5;
    let h = Harness::new(settings);
    let dep = Invocations::default();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let breaker = h.registry.breaker("llm");
        let dep = dep.clone();
        handles.push(tokio::spawn(async move {
            breaker.call(|| dep.dependency(false)).await
        }));
    }
    let mut rejected = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap_err().is_open() {
            rejected += 1;
        }
    }

    let m = h.registry.breaker("llm").metrics();
    assert_eq!(m.state, CircuitState::Open);
    assert_eq!(m.failed_requests, 5);
    assert_eq!(rejected, 15);
    assert_eq!(dep.count(), 5);
    let opened = m
        .recent_transitions
        .iter()
        .filter(|t| t.to == CircuitState::Open)
        .count();
    assert_eq!(opened, 1);
}

#[tokio::test]
async fn test_breakers_do_not_block_each_other() {
    let h = Harness::new(BreakerSettings::default());
    let slow = h.registry.breaker("slow-dependency");
    let fast = h.registry.breaker("fast-dependency");
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let pending = tokio::spawn(async move {
        slow.call(|| async move {
            let _ = release_rx.await;
            Ok::<_, DependencyError>(())
        })
        .await
    });

    // Completes while the slow breaker is still held.
    tokio::time::timeout(
        Duration::from_secs(1),
        fast.call(|| async { Ok::<_, DependencyError>(()) }),
    )
    .await
    .expect("fast breaker waited on slow breaker")
    .unwrap();

    release_tx.send(()).unwrap();
    pending.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_metrics_readable_during_inflight_call() {
    let h = Harness::new(BreakerSettings::default());
    let breaker = h.registry.breaker("etl");
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let (started_tx, started_rx) = oneshot::channel::<()>();

    let held = breaker.clone();
    let pending = tokio::spawn(async move {
        held.call(|| async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok::<_, DependencyError>(())
        })
        .await
    });

    started_rx.await.unwrap();
    let m = breaker.metrics();
    assert_eq!(m.total_requests, 0);
    assert_eq!(m.state, CircuitState::Closed);

    release_tx.send(()).unwrap();
    pending.await.unwrap().unwrap();
    assert_eq!(breaker.metrics().total_requests, 1);
}
