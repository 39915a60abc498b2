//! Shared test utilities for logs-api-simulator integration tests.

#![allow(dead_code)]

use axum::http::StatusCode;
use logs_api_simulator::{LifecycleEvent, LogRecord};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Batches received by an in-test log destination.
#[derive(Clone)]
pub struct LogReceiver {
    pub url: String,
    pub batches: Arc<Mutex<Vec<Vec<LogRecord>>>>,
    pub received: Arc<Notify>,
}

impl LogReceiver {
    /// Every record received so far, in arrival order.
    pub async fn records(&self) -> Vec<LogRecord> {
        self.batches.lock().await.iter().flatten().cloned().collect()
    }

    /// Waits until `predicate` holds for the received batches.
    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> bool
    where
        F: Fn(&[Vec<LogRecord>]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = self.received.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if predicate(&self.batches.lock().await) {
                return true;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(remaining) => {
                    return false;
                }
            }
        }
    }
}

/// Starts a log destination that answers every batch with `status`.
pub async fn start_log_receiver_with_status(status: StatusCode) -> LogReceiver {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let received = Arc::new(Notify::new());
    let batches_clone = Arc::clone(&batches);
    let received_clone = Arc::clone(&received);

    let app = axum::Router::new().route(
        "/logs",
        axum::routing::post(
            move |axum::Json(payload): axum::Json<Vec<LogRecord>>| {
                let batches = Arc::clone(&batches_clone);
                let notify = Arc::clone(&received_clone);
                async move {
                    batches.lock().await.push(payload);
                    notify.notify_waiters();
                    status
                }
            },
        ),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    LogReceiver {
        url: format!("http://{}/logs", addr),
        batches,
        received,
    }
}

/// Starts a log destination that accepts every batch.
pub async fn start_log_receiver() -> LogReceiver {
    start_log_receiver_with_status(StatusCode::OK).await
}

/// Registers an extension and returns the issued identifier.
pub async fn register_extension(client: &Client, base_url: &str, name: &str) -> String {
    let response = client
        .post(format!("{}/2020-01-01/extension/register", base_url))
        .header("Lambda-Extension-Name", name)
        .json(&json!({ "events": ["INVOKE", "SHUTDOWN"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    response
        .headers()
        .get("Lambda-Extension-Identifier")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Builds a Logs API subscription body.
pub fn subscription(uri: &str, buffering: Value) -> Value {
    json!({
        "destination": { "protocol": "HTTP", "URI": uri },
        "types": ["platform", "function"],
        "buffering": buffering
    })
}

/// Sends a Logs API subscription.
pub async fn subscribe_logs(client: &Client, base_url: &str, body: &Value) {
    let response = client
        .put(format!("{}/2020-08-15/logs", base_url))
        .json(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

/// Polls `/event/next` once.
pub async fn next_event(client: &Client, base_url: &str) -> LifecycleEvent {
    let response = client
        .get(format!("{}/2020-01-01/extension/event/next", base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}
