//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `LEDGER_RECONCILER` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use ledger_reconciler::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod database;
mod documents;
mod email;
mod error;
mod notifications;
mod server;
mod webhooks;

pub use database::DatabaseConfig;
pub use documents::{DocumentsConfig, RendererKind};
pub use email::EmailConfig;
pub use error::{ConfigError, ValidationError};
pub use notifications::{NotificationSinkKind, NotificationsConfig};
pub use server::{Environment, ServerConfig};
pub use webhooks::WebhooksConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration; in-memory storage when absent
    pub database: Option<DatabaseConfig>,

    /// Invoice document rendering and storage
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Notification fan-out
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Email configuration (Resend)
    pub email: Option<EmailConfig>,

    /// Webhook processing budget and retention
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `LEDGER_RECONCILER` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `LEDGER_RECONCILER__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `LEDGER_RECONCILER__DATABASE__URL=...` -> `database.url = ...`
    /// - `LEDGER_RECONCILER__WEBHOOKS__RETENTION_DAYS=14` -> `webhooks.retention_days = 14`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LEDGER_RECONCILER")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.documents.validate()?;
        self.webhooks.validate()?;

        match (&self.email, self.notifications.sink) {
            (Some(email), _) => email.validate()?,
            (None, NotificationSinkKind::Email) if self.notifications.enabled => {
                return Err(ValidationError::EmailSinkWithoutEmail)
            }
            (None, _) => {}
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "LEDGER_RECONCILER__DATABASE__URL",
        "LEDGER_RECONCILER__SERVER__PORT",
        "LEDGER_RECONCILER__SERVER__ENVIRONMENT",
        "LEDGER_RECONCILER__NOTIFICATIONS__SINK",
        "LEDGER_RECONCILER__EMAIL__RESEND_API_KEY",
        "LEDGER_RECONCILER__WEBHOOKS__RETENTION_DAYS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        clear_env();
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_with_no_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert!(config.database.is_none());
        assert!(config.email.is_none());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.webhooks.retention_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_database_section() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[(
            "LEDGER_RECONCILER__DATABASE__URL",
            "postgresql://test@localhost/test",
        )])
        .unwrap();

        let database = config.database.unwrap();
        assert_eq!(database.url.expose_secret(), "postgresql://test@localhost/test");
        assert_eq!(database.max_connections, 10);
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("LEDGER_RECONCILER__SERVER__PORT", "3000"),
            ("LEDGER_RECONCILER__SERVER__ENVIRONMENT", "production"),
            ("LEDGER_RECONCILER__WEBHOOKS__RETENTION_DAYS", "7"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.webhooks.retention_days, 7);
    }

    #[test]
    fn test_email_sink_requires_email_section() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("LEDGER_RECONCILER__NOTIFICATIONS__SINK", "email")]).unwrap();

        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmailSinkWithoutEmail)
        ));
    }

    #[test]
    fn test_email_section_is_validated() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("LEDGER_RECONCILER__NOTIFICATIONS__SINK", "email"),
            ("LEDGER_RECONCILER__EMAIL__RESEND_API_KEY", "sk_wrong"),
        ])
        .unwrap();

        assert!(matches!(config.validate(), Err(ValidationError::InvalidResendKey)));
    }
}
