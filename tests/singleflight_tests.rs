// tests/singleflight_tests.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use survey_backend::cache::Singleflight;
use survey_backend::error::AppError;
use tokio::sync::Notify;

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_misses_collapse_into_one_load() {
    // Arrange
    let flight = Arc::new(Singleflight::<String>::new());
    let loads = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    // Act: 100 callers race on the same missing key; the loader blocks until
    // every caller has joined the flight, then resolves once.
    let mut handles = Vec::new();
    for _ in 0..100 {
        let flight = flight.clone();
        let loads = loads.clone();
        let entered = entered.clone();
        let release = release.clone();
        handles.push(tokio::spawn(async move {
            entered.fetch_add(1, Ordering::SeqCst);
            flight
                .run("survey:alpha", || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                    Ok("snapshot".to_string())
                })
                .await
        }));
    }

    while entered.load(Ordering::SeqCst) < 100 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    // Let the last joiners reach the flight before the loader resolves
    tokio::time::sleep(Duration::from_millis(50)).await;
    release.notify_one();

    // Assert: one backing fetch, every caller observes the same result
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task should not panic"));
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 100);
    for result in results {
        assert_eq!(result.expect("should succeed"), "snapshot");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failed_flight_shares_its_error_then_retires() {
    let flight = Arc::new(Singleflight::<String>::new());
    let loads = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let flight = flight.clone();
        let loads = loads.clone();
        let entered = entered.clone();
        let release = release.clone();
        handles.push(tokio::spawn(async move {
            entered.fetch_add(1, Ordering::SeqCst);
            flight
                .run("survey:beta", || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                    Err(AppError::StorageError("connection reset".to_string()))
                })
                .await
        }));
    }

    while entered.load(Ordering::SeqCst) < 10 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    release.notify_one();

    // Every waiter receives the single error of the shared fetch
    for handle in handles {
        let result = handle.await.expect("task should not panic");
        match result {
            Err(AppError::StorageError(msg)) => assert!(msg.contains("connection reset")),
            other => panic!("expected the shared StorageError, got {:?}", other),
        }
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    // The failed flight retired; the next call starts a fresh load
    let result = flight
        .run("survey:beta", || async { Ok("recovered".to_string()) })
        .await
        .expect("fresh flight should succeed");
    assert_eq!(result, "recovered");
    assert_eq!(loads.load(Ordering::SeqCst), 1, "fresh loader is a different closure");
}

#[tokio::test]
async fn sequential_calls_do_not_share_a_flight() {
    let flight = Singleflight::<i32>::new();
    let loads = AtomicUsize::new(0);

    for _ in 0..3 {
        let value = flight
            .run("survey:gamma", || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await
            .expect("should succeed");
        assert_eq!(value, 42);
    }

    // Each completed flight retires, so every sequential call loads anew
    assert_eq!(loads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn distinct_keys_fly_independently() {
    let flight = Arc::new(Singleflight::<String>::new());
    let loads = Arc::new(AtomicUsize::new(0));

    let a = {
        let loads = loads.clone();
        flight.run("survey:a", || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok("a".to_string())
        })
    };
    let b = {
        let loads = loads.clone();
        flight.run("survey:b", || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok("b".to_string())
        })
    };

    let (a, b) = tokio::join!(a, b);
    assert_eq!(a.expect("a should succeed"), "a");
    assert_eq!(b.expect("b should succeed"), "b");
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}
