//! Tests for the single-flight event cycle.
//!
//! These tests verify:
//! - Only one event is outstanding at a time
//! - Overlapping polls are served one after another
//! - Each cycle buffers the logs its simulated work produced

mod common;

use common::{next_event, subscribe_logs, subscription};
use logs_api_simulator::{DeliveryPolicy, LogType, Simulator};
use reqwest::Client;
use serde_json::json;
use std::time::{Duration, Instant};

/// One poll buffers exactly one batch of function logs.
#[tokio::test]
async fn test_single_event_buffers_seven_function_records() {
    let simulator = Simulator::builder()
        .delivery_policy(DeliveryPolicy::Never)
        .build()
        .await
        .unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    subscribe_logs(
        &client,
        &base_url,
        &subscription(
            "http://sink.test",
            json!({ "maxItems": 1, "maxBytes": 1, "timeoutMs": 1 }),
        ),
    )
    .await;

    next_event(&client, &base_url).await;
    simulator
        .wait_for_cycles(1, Duration::from_secs(5))
        .await
        .unwrap();

    let logs = simulator.buffered_logs().await;
    assert_eq!(logs.len(), 7);
    assert!(logs.iter().all(|r| r.log_type == LogType::Function));
    assert!(logs.iter().all(|r| r.record["level"] == "INFO"));
}

/// The event is returned before the simulated work has finished.
#[tokio::test]
async fn test_response_precedes_work() {
    let simulator = Simulator::builder()
        .work_delay(Duration::from_millis(500))
        .delivery_policy(DeliveryPolicy::Never)
        .build()
        .await
        .unwrap();
    let client = Client::new();

    let started = Instant::now();
    next_event(&client, &simulator.base_url()).await;

    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(simulator.is_event_outstanding());
    assert_eq!(simulator.buffered_log_count().await, 0);

    simulator
        .wait_for_cycles(1, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(!simulator.is_event_outstanding());
    assert_eq!(simulator.buffered_log_count().await, 7);
}

/// A second overlapping poll waits until the first cycle releases the gate.
#[tokio::test]
async fn test_overlapping_polls_are_serialised() {
    let simulator = Simulator::builder()
        .delivery_policy(DeliveryPolicy::Never)
        .build()
        .await
        .unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    let first = {
        let client = client.clone();
        let base_url = base_url.clone();
        tokio::spawn(async move {
            next_event(&client, &base_url).await;
            Instant::now()
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let client = client.clone();
        let base_url = base_url.clone();
        tokio::spawn(async move {
            next_event(&client, &base_url).await;
            Instant::now()
        })
    };

    let first_at = first.await.unwrap();
    let second_at = second.await.unwrap();

    assert!(second_at > first_at);
    assert!(second_at - first_at >= Duration::from_millis(100));
    assert!(simulator.completed_cycles() >= 1);
}

/// Many concurrent polls each get their own, non-overlapping cycle.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_polls_never_overlap() {
    let work_delay = Duration::from_millis(40);
    let simulator = Simulator::builder()
        .work_delay(work_delay)
        .delivery_policy(DeliveryPolicy::Never)
        .build()
        .await
        .unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        let base_url = base_url.clone();
        handles.push(tokio::spawn(async move {
            next_event(&client, &base_url).await;
            Instant::now()
        }));
    }

    let mut responded = Vec::new();
    for handle in handles {
        responded.push(handle.await.unwrap());
    }
    responded.sort();

    // Response latency jitter can eat into the gap, never the whole of it.
    for pair in responded.windows(2) {
        assert!(pair[1] - pair[0] >= work_delay / 2);
    }

    simulator
        .wait_for_cycles(5, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(simulator.buffered_log_count().await, 35);
}

/// Without a subscription the cycle still completes and keeps its logs.
#[tokio::test]
async fn test_cycle_without_subscription_keeps_logs() {
    let simulator = Simulator::builder()
        .work_delay(Duration::from_millis(10))
        .delivery_policy(DeliveryPolicy::Always)
        .build()
        .await
        .unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    next_event(&client, &base_url).await;
    next_event(&client, &base_url).await;
    simulator
        .wait_for_cycles(2, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(simulator.buffered_log_count().await, 14);
    assert!(!simulator.is_event_outstanding());
}

/// A capped buffer drops its oldest records.
#[tokio::test]
async fn test_buffer_cap_drops_oldest_records() {
    let simulator = Simulator::builder()
        .work_delay(Duration::from_millis(5))
        .delivery_policy(DeliveryPolicy::Never)
        .max_buffered_records(10)
        .build()
        .await
        .unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    next_event(&client, &base_url).await;
    simulator
        .wait_for_cycles(1, Duration::from_secs(5))
        .await
        .unwrap();
    let first_batch = simulator.buffered_logs().await;

    next_event(&client, &base_url).await;
    simulator
        .wait_for_cycles(2, Duration::from_secs(5))
        .await
        .unwrap();

    let logs = simulator.buffered_logs().await;
    assert_eq!(logs.len(), 10);
    assert_eq!(logs[0], first_batch[4]);
}
