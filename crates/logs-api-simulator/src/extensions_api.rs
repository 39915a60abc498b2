//! Lambda Extensions API HTTP endpoints implementation.
//!
//! Implements the registration and event endpoints of the Extensions API as
//! documented at:
//! <https://docs.aws.amazon.com/lambda/latest/dg/runtimes-extensions-api.html>

use crate::dispatch::EventDispatcher;
use crate::extension::new_extension_id;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;

/// Header carrying the identifier issued at registration.
pub const EXTENSION_IDENTIFIER_HEADER: &str = "Lambda-Extension-Identifier";

/// Header an extension uses to announce its name.
pub const EXTENSION_NAME_HEADER: &str = "Lambda-Extension-Name";

/// Shared state for Extensions API handlers.
#[derive(Clone)]
pub(crate) struct ExtensionsApiState {
    pub dispatcher: Arc<EventDispatcher>,
}

/// Creates the Extensions API router.
pub(crate) fn create_extensions_api_router(state: ExtensionsApiState) -> Router {
    Router::new()
        .route("/2020-01-01/extension/register", post(register_extension))
        .route("/2020-01-01/extension/event/next", get(next_event))
        .with_state(state)
}

/// POST /2020-01-01/extension/register
///
/// Issues a fresh extension identifier. The request body is ignored and no
/// record of the registration is kept.
async fn register_extension(headers: HeaderMap) -> Response {
    let extension_id = new_extension_id();
    let extension_name = headers
        .get(EXTENSION_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info!(target: "lambda_lifecycle", "🔌 Extension registered: {} ({})", extension_name, extension_id);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Ok(id) = HeaderValue::from_str(&extension_id) {
        response_headers.insert(EXTENSION_IDENTIFIER_HEADER, id);
    }

    (StatusCode::OK, response_headers).into_response()
}

/// GET /2020-01-01/extension/event/next
///
/// Long-polls for the next lifecycle event. Blocks while another event is
/// outstanding, then responds as soon as the new event is built.
async fn next_event(State(state): State<ExtensionsApiState>) -> Response {
    tracing::debug!(
        outstanding = state.dispatcher.gate().is_outstanding(),
        "Extension polling /next"
    );

    let event = state.dispatcher.next_event().await;
    Json(event).into_response()
}
