//! Normalized inbound webhook envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Authenticated, provider-agnostic wrapper handed over by the boundary.
///
/// `payload` is the provider's own event body: for Stripe the event with
/// `id`, `created` and `data.object`; for PayPal the event with `id`,
/// `create_time` and `resource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    pub provider: String,
    pub event_type: String,
    pub payload: JsonValue,
}

impl WebhookEnvelope {
    pub fn new(
        provider: impl Into<String>,
        event_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self {
            provider: provider.into(),
            event_type: event_type.into(),
            payload,
        }
    }

    /// Provider event id when the payload carries one.
    pub fn event_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(JsonValue::as_str)
    }
}
