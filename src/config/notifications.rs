//! Notification configuration

use serde::Deserialize;

/// Where user notifications go
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSinkKind {
    /// Log only
    #[default]
    Log,
    /// Resend e-mail; requires the `email` section
    Email,
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Subscribe the notification fan-out at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub sink: NotificationSinkKind,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sink: NotificationSinkKind::default(),
        }
    }
}

fn default_enabled() -> bool {
    true
}
