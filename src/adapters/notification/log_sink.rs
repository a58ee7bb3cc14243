//! Notification sink that only logs.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::domain::foundation::UserId;
use crate::ports::{recipient_email, NotificationError, NotificationSink, NotificationTemplate};

/// Default sink when no e-mail provider is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

impl LogNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(
        &self,
        user_id: &UserId,
        template: NotificationTemplate,
        context: JsonValue,
    ) -> Result<(), NotificationError> {
        let email = recipient_email(&context)
            .ok_or_else(|| NotificationError::UnknownRecipient(user_id.to_string()))?;

        info!(
            user_id = %user_id,
            %template,
            to = email,
            subject = template.subject(),
            "Notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn requires_an_email() {
        let sink = LogNotificationSink::new();
        let user = UserId::new("user-1").unwrap();

        let err = sink
            .send(&user, NotificationTemplate::PaymentFailed, json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::UnknownRecipient(_)));
        assert!(sink
            .send(&user, NotificationTemplate::PaymentFailed, json!({ "email": "a@b.c" }))
            .await
            .is_ok());
    }
}
