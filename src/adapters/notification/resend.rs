//! Resend e-mail notification sink.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::domain::foundation::UserId;
use crate::ports::{recipient_email, NotificationError, NotificationSink, NotificationTemplate};

const DEFAULT_API_URL: &str = "https://api.resend.com/emails";

#[derive(Clone)]
pub struct ResendNotificationSink {
    client: Client,
    api_key: Secret<String>,
    from: String,
    api_url: String,
}

impl ResendNotificationSink {
    pub fn new(api_key: Secret<String>, from: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            from: from.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[derive(Serialize)]
struct ResendReq<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

/// Short HTML body for a template.
fn render_body(template: NotificationTemplate, context: &JsonValue) -> String {
    let field = |key: &str| context.get(key).and_then(JsonValue::as_str).unwrap_or("");
    let greeting = match field("name") {
        "" => "Hello,".to_string(),
        name => format!("Hello {},", name),
    };
    let amount = field("amount_display");

    let line = match template {
        NotificationTemplate::PaymentSucceeded => {
            format!("We received your payment of {}.", amount)
        }
        NotificationTemplate::PaymentFailed => {
            format!("Your payment of {} could not be completed.", amount)
        }
        NotificationTemplate::SubscriptionCreated => "Your subscription is now active.".to_string(),
        NotificationTemplate::SubscriptionCanceled => {
            "Your subscription has been canceled.".to_string()
        }
        NotificationTemplate::RefundProcessed => format!("A refund of {} has been issued.", amount),
    };

    format!("<p>{}</p><p>{}</p>", greeting, line)
}

#[async_trait]
impl NotificationSink for ResendNotificationSink {
    async fn send(
        &self,
        user_id: &UserId,
        template: NotificationTemplate,
        context: JsonValue,
    ) -> Result<(), NotificationError> {
        let to = recipient_email(&context)
            .ok_or_else(|| NotificationError::UnknownRecipient(user_id.to_string()))?;

        let body = ResendReq {
            from: &self.from,
            to: [to],
            subject: template.subject(),
            html: render_body(template, &context),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(user_id = %user_id, %template, "Notification delivered via Resend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_includes_name_and_amount() {
        let body = render_body(
            NotificationTemplate::PaymentSucceeded,
            &json!({ "name": "Ada", "amount_display": "20.00 USD" }),
        );

        assert_eq!(body, "<p>Hello Ada,</p><p>We received your payment of 20.00 USD.</p>");
    }

    #[test]
    fn body_without_name_uses_plain_greeting() {
        let body = render_body(NotificationTemplate::SubscriptionCanceled, &json!({}));
        assert!(body.starts_with("<p>Hello,</p>"));
    }

    #[tokio::test]
    async fn missing_email_fails_before_any_request() {
        let api_key = Secret::new("re_test".to_string());
        let sink = ResendNotificationSink::new(api_key, "billing@example.com")
            .with_api_url("http://127.0.0.1:9/unreachable");

        let err = sink
            .send(
                &UserId::new("user-1").unwrap(),
                NotificationTemplate::RefundProcessed,
                json!({ "name": "Ada" }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::UnknownRecipient(_)));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let api_key = Secret::new("re_test".to_string());
        let sink = ResendNotificationSink::new(api_key, "billing@example.com")
            .with_api_url("http://127.0.0.1:9/emails");

        let err = sink
            .send(
                &UserId::new("user-1").unwrap(),
                NotificationTemplate::PaymentSucceeded,
                json!({ "email": "ada@example.com" }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::Transport(_)));
    }
}
