//! Email configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;

/// Email configuration (Resend)
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Resend API key
    pub resend_api_key: Secret<String>,

    /// From email address
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// From name
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Override for the Resend endpoint
    pub api_url: Option<String>,
}

impl EmailConfig {
    /// Get formatted "From" header value
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Validate email configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let key = self.resend_api_key.expose_secret();
        if key.is_empty() {
            return Err(ValidationError::MissingRequired("RESEND_API_KEY"));
        }
        if !key.starts_with("re_") {
            return Err(ValidationError::InvalidResendKey);
        }
        if !self.from_email.contains('@') {
            return Err(ValidationError::InvalidFromEmail);
        }
        Ok(())
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: Secret::new(String::new()),
            from_email: default_from_email(),
            from_name: default_from_name(),
            api_url: None,
        }
    }
}

fn default_from_email() -> String {
    "billing@example.com".to_string()
}

fn default_from_name() -> String {
    "Billing".to_string()
}
