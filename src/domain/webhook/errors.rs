//! Reconciliation error types.
//!
//! Each error maps to an HTTP status that tells the provider whether to
//! redeliver: 4xx stops retries, 5xx asks for a retry.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors that occur while reconciling a webhook.
///
/// Unknown event types, unknown providers, stale snapshots and missing
/// linkage are outcomes, not errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Payload could not be parsed into the provider's typed event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Required field missing from the payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A uniqueness conflict persisted after one retry.
    #[error("Storage conflict on {0}")]
    StorageConflict(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Handling exceeded the processing budget.
    #[error("Processing exceeded {0:?}")]
    Timeout(Duration),
}

impl ReconcileError {
    /// Returns true if the provider should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::StorageConflict(_)
                | ReconcileError::Storage(_)
                | ReconcileError::Timeout(_)
        )
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReconcileError::MalformedPayload(_) | ReconcileError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }
            ReconcileError::StorageConflict(_)
            | ReconcileError::Storage(_)
            | ReconcileError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            ReconcileError::MissingField(_) => "MISSING_FIELD",
            ReconcileError::StorageConflict(_) => "STORAGE_CONFLICT",
            ReconcileError::Storage(_) => "STORAGE_ERROR",
            ReconcileError::Timeout(_) => "TIMEOUT",
        }
    }
}

impl From<ValidationError> for ReconcileError {
    fn from(err: ValidationError) -> Self {
        ReconcileError::MalformedPayload(err.to_string())
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::MalformedPayload(err.to_string())
    }
}

impl From<DomainError> for ReconcileError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::UniqueViolation | ErrorCode::StorageConflict => {
                ReconcileError::StorageConflict(err.message)
            }
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidFormat
            | ErrorCode::InvariantViolated => ReconcileError::MalformedPayload(err.message),
            _ => ReconcileError::Storage(err.to_string()),
        }
    }
}
