//! Axum router configuration for the webhook boundary.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{health, receive_webhook, WebhookAppState};

/// Create the webhook router.
///
/// # Routes
/// - `POST /webhooks` - Reconcile a normalized webhook envelope
/// - `GET /health` - Liveness probe
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new()
        .route("/webhooks", post(receive_webhook))
        .route("/health", get(health))
}

/// The complete application with request tracing, request ids, a request
/// timeout and a body size limit.
pub fn webhook_router(
    state: WebhookAppState,
    request_timeout: Duration,
    max_body_bytes: usize,
) -> Router {
    webhook_routes()
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
