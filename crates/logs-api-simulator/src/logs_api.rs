//! Lambda Logs API HTTP endpoint implementation.
//!
//! Implements the subscription endpoint of the Logs API as documented at:
//! <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-logs-api.html>

use crate::delivery::{DeliveryConfig, LogSink};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::put,
};
use std::sync::Arc;

/// Shared state for Logs API handlers.
#[derive(Clone)]
pub(crate) struct LogsApiState {
    pub sink: Arc<LogSink>,
}

/// Creates the Logs API router.
pub(crate) fn create_logs_api_router(state: LogsApiState) -> Router {
    Router::new()
        .route("/2020-08-15/logs", put(subscribe_logs))
        .with_state(state)
}

/// PUT /2020-08-15/logs
///
/// Stores the delivery configuration, replacing any earlier one, and always
/// answers 200. The content type is not checked. A body that does not parse
/// as a configuration is stored as an empty one, which has no destination.
async fn subscribe_logs(State(state): State<LogsApiState>, body: Bytes) -> Response {
    let config = serde_json::from_slice::<DeliveryConfig>(&body).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unreadable log subscription, storing it without a destination");
        DeliveryConfig::default()
    });

    if let Some(destination) = &config.destination
        && destination.protocol != "HTTP"
    {
        tracing::warn!(
            protocol = %destination.protocol,
            "Unsupported log destination protocol, storing anyway"
        );
    }

    tracing::info!(
        types = ?config.types,
        destination = config.destination_uri().unwrap_or("<none>"),
        buffering = ?config.buffering,
        "Extension subscribed to logs"
    );

    if state.sink.configure(config).await.is_some() {
        tracing::debug!("Replaced previous log subscription");
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
    )
        .into_response()
}
