//! HTTP DTOs for the webhook boundary.

use serde::Serialize;

use crate::domain::webhook::ReconcileOutcome;

/// Body returned with every 200.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAcceptedResponse {
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error body; `retryable` tells operators whether the provider will redeliver.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}
