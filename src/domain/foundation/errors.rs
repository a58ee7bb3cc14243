//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidFormat,
    InvariantViolated,

    // Not found errors
    TransactionNotFound,
    InvoiceNotFound,
    OrderNotFound,

    // State errors
    InvalidStateTransition,

    // Persistence errors
    UniqueViolation,
    StorageConflict,
    DatabaseError,

    // Downstream errors
    RenderFailed,
    DeliveryFailed,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::InvariantViolated => "INVARIANT_VIOLATED",
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ErrorCode::InvoiceNotFound => "INVOICE_NOT_FOUND",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::UniqueViolation => "UNIQUE_VIOLATION",
            ErrorCode::StorageConflict => "STORAGE_CONFLICT",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::RenderFailed => "RENDER_FAILED",
            ErrorCode::DeliveryFailed => "DELIVERY_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a database error from any displayable source.
    pub fn database(message: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, message.to_string())
    }

    /// Creates a unique-violation error naming the conflicting key.
    pub fn unique_violation(entity: &str, key: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UniqueViolation,
            format!("{} already exists", entity),
        )
        .with_detail("key", key)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// True when the error was raised by a uniqueness constraint.
    pub fn is_unique_violation(&self) -> bool {
        self.code == ErrorCode::UniqueViolation
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("quantity", 1, 100, 0);
        assert_eq!(
            format!("{}", err),
            "Field 'quantity' must be between 1 and 100, got 0"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::InvoiceNotFound, "Invoice not found");
        assert_eq!(format!("{}", err), "[INVOICE_NOT_FOUND] Invoice not found");
    }

    #[test]
    fn unique_violation_carries_key_detail() {
        let err = DomainError::unique_violation("Transaction", "stripe:pi_1");
        assert!(err.is_unique_violation());
        assert_eq!(err.details.get("key"), Some(&"stripe:pi_1".to_string()));
    }

    #[test]
    fn validation_error_converts_to_domain_error() {
        let err: DomainError = ValidationError::empty_field("currency").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(err.message.contains("currency"));
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(format!("{}", ErrorCode::StorageConflict), "STORAGE_CONFLICT");
        assert_eq!(
            format!("{}", ErrorCode::InvalidStateTransition),
            "INVALID_STATE_TRANSITION"
        );
    }
}
