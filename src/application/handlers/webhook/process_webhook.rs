//! ProcessWebhookHandler - entry point for normalized webhook envelopes.
//!
//! Resolves the provider, drops redeliveries of events already
//! acknowledged, and runs the provider handler under the processing budget.
//! An event is recorded as acknowledged only after it was handled, so a
//! failed attempt is processed again on redelivery.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{PayPalEventHandler, StripeEventHandler};
use crate::domain::billing::Provider;
use crate::domain::webhook::{
    PayPalEvent, ReconcileError, ReconcileOutcome, StripeEvent, WebhookEnvelope,
};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

/// Command to process one inbound webhook.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    pub envelope: WebhookEnvelope,
}

pub struct ProcessWebhookHandler {
    webhook_events: Arc<dyn WebhookEventRepository>,
    stripe: StripeEventHandler,
    paypal: PayPalEventHandler,
    processing_budget: Duration,
}

impl ProcessWebhookHandler {
    pub fn new(
        webhook_events: Arc<dyn WebhookEventRepository>,
        stripe: StripeEventHandler,
        paypal: PayPalEventHandler,
        processing_budget: Duration,
    ) -> Self {
        Self {
            webhook_events,
            stripe,
            paypal,
            processing_budget,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessWebhookCommand,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let envelope = cmd.envelope;

        let provider = match envelope.provider.parse::<Provider>() {
            Ok(provider) => provider,
            Err(_) => {
                warn!(
                    provider = %envelope.provider,
                    event_type = %envelope.event_type,
                    "Webhook from unknown provider ignored"
                );
                return Ok(ReconcileOutcome::Ignored);
            }
        };
        let event_id = envelope
            .event_id()
            .ok_or(ReconcileError::MissingField("payload.id"))?
            .to_string();

        if let Some(previous) = self.webhook_events.find(provider, &event_id).await? {
            debug!(
                %provider,
                %event_id,
                result = %previous.result,
                "Webhook already processed"
            );
            return Ok(ReconcileOutcome::Duplicate);
        }

        let handled = self.dispatch(provider, &envelope);
        let outcome = tokio::time::timeout(self.processing_budget, handled)
            .await
            .map_err(|_| ReconcileError::Timeout(self.processing_budget))??;

        let record = match outcome {
            ReconcileOutcome::Processed | ReconcileOutcome::Duplicate => {
                WebhookEventRecord::success(provider, &event_id, &envelope.event_type)
            }
            ReconcileOutcome::Ignored => WebhookEventRecord::ignored(
                provider,
                &event_id,
                &envelope.event_type,
                "unrecognized event type",
            ),
            ReconcileOutcome::Stale => WebhookEventRecord::ignored(
                provider,
                &event_id,
                &envelope.event_type,
                "stale snapshot",
            ),
        };
        if self.webhook_events.save(record).await? == SaveResult::AlreadyExists {
            debug!(%provider, %event_id, "Concurrent delivery acknowledged first");
        }

        info!(
            %provider,
            %event_id,
            event_type = %envelope.event_type,
            outcome = %outcome,
            "Webhook reconciled"
        );
        Ok(outcome)
    }

    async fn dispatch(
        &self,
        provider: Provider,
        envelope: &WebhookEnvelope,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match provider {
            Provider::Stripe => {
                let event = StripeEvent::parse(&envelope.payload)?;
                self.stripe.handle(event, &envelope.event_type).await
            }
            Provider::PayPal => {
                let event = PayPalEvent::parse(&envelope.payload)?;
                self.paypal.handle(event, &envelope.event_type).await
            }
        }
    }
}
