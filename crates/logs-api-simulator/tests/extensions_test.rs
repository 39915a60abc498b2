//! Integration tests for the Extensions API endpoints.

mod common;

use common::{next_event, register_extension};
use logs_api_simulator::{DeliveryPolicy, EventType, Simulator};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

#[tokio::test]
async fn test_registration_returns_uuid_identifier() {
    let simulator = Simulator::builder().build().await.unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    let extension_id = register_extension(&client, &base_url, "test-extension").await;

    assert!(Uuid::parse_str(&extension_id).is_ok());
}

#[tokio::test]
async fn test_registration_is_stateless_and_unique() {
    let simulator = Simulator::builder().build().await.unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    let first = register_extension(&client, &base_url, "same-name").await;
    let second = register_extension(&client, &base_url, "same-name").await;

    assert_ne!(first, second);
    assert!(!simulator.is_event_outstanding());
}

#[tokio::test]
async fn test_registration_ignores_body_and_never_blocks() {
    let simulator = Simulator::builder()
        .work_delay(Duration::from_secs(5))
        .build()
        .await
        .unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    // Hold the gate so any blocking on it would show up as a timeout.
    next_event(&client, &base_url).await;
    assert!(simulator.is_event_outstanding());

    let response = timeout(
        Duration::from_secs(1),
        client
            .post(format!("{}/2020-01-01/extension/register", base_url))
            .body("not json at all")
            .send(),
    )
    .await
    .expect("registration should not wait for the gate")
    .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let id = response
        .headers()
        .get("Lambda-Extension-Identifier")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_next_event_wire_format() {
    let simulator = Simulator::builder()
        .work_delay(Duration::from_millis(10))
        .delivery_policy(DeliveryPolicy::Never)
        .build()
        .await
        .unwrap();
    let client = Client::new();

    let body: Value = client
        .get(format!(
            "{}/2020-01-01/extension/event/next",
            simulator.base_url()
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["eventType"], "INVOKE");
    assert_eq!(body["deadlineMs"], 1000);
    for field in [
        &body["requestId"],
        &body["invokedFunctionArn"],
        &body["tracing"]["value"],
    ] {
        assert!(Uuid::parse_str(field.as_str().unwrap()).is_ok());
    }
    assert!(body["tracing"]["type"].is_string());
}

#[tokio::test]
async fn test_consecutive_events_have_distinct_request_ids() {
    let simulator = Simulator::builder()
        .work_delay(Duration::from_millis(1))
        .delivery_policy(DeliveryPolicy::Never)
        .build()
        .await
        .unwrap();
    let base_url = simulator.base_url();
    let client = Client::new();

    let mut seen = std::collections::HashSet::new();
    for _ in 0..20 {
        let event = next_event(&client, &base_url).await;
        assert_eq!(event.event_type(), EventType::Invoke);
        assert!(seen.insert(event.request_id().unwrap().to_string()));
    }
}

#[tokio::test]
async fn test_unknown_route_returns_not_found() {
    let simulator = Simulator::builder().build().await.unwrap();
    let client = Client::new();

    let response = client
        .get(format!("{}/2018-06-01/runtime/invocation/next", simulator.base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}
