//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Interval must be positive: {0}")]
    InvalidInterval(&'static str),

    #[error("Sweep batch size must be positive")]
    InvalidBatchSize,

    #[error("Retention must be at least one day")]
    InvalidRetention,

    #[error("E-mail notifications require the email section")]
    EmailSinkWithoutEmail,

    #[error("Invalid Resend API key format")]
    InvalidResendKey,

    #[error("Invalid from email address")]
    InvalidFromEmail,
}
