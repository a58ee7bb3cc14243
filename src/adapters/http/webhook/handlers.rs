//! HTTP handlers for the webhook boundary.
//!
//! The boundary is trusted: signatures are verified upstream and the body
//! arrives as a normalized `WebhookEnvelope`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{error, warn};

use crate::application::handlers::{ProcessWebhookCommand, ProcessWebhookHandler};
use crate::domain::webhook::{ReconcileError, WebhookEnvelope};

use super::dto::{ErrorResponse, HealthResponse, WebhookAcceptedResponse};

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub processor: Arc<ProcessWebhookHandler>,
}

impl WebhookAppState {
    pub fn new(processor: Arc<ProcessWebhookHandler>) -> Self {
        Self { processor }
    }
}

/// POST /webhooks - reconcile one normalized webhook envelope
pub async fn receive_webhook(
    State(state): State<WebhookAppState>,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(&body).map_err(ReconcileError::from)?;

    let outcome = state
        .processor
        .handle(ProcessWebhookCommand { envelope })
        .await?;

    Ok((StatusCode::OK, Json(WebhookAcceptedResponse { outcome })))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// API error type that converts reconcile errors to HTTP responses.
pub struct WebhookApiError(ReconcileError);

impl From<ReconcileError> for WebhookApiError {
    fn from(err: ReconcileError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let err = self.0;
        let status = err.status_code();

        if err.is_retryable() {
            error!(code = err.code(), error = %err, "Webhook failed, provider will redeliver");
        } else {
            warn!(code = err.code(), error = %err, "Webhook rejected");
        }

        let body = ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
