//! StripeEventHandler - dispatches typed Stripe events to the reconciler.

use std::sync::Arc;

use tracing::debug;

use crate::application::handlers::billing::Reconciler;
use crate::domain::billing::SubscriptionChange;
use crate::domain::webhook::{ReconcileError, ReconcileOutcome, StripeEvent, StripeEventKind};

pub struct StripeEventHandler {
    reconciler: Arc<Reconciler>,
}

impl StripeEventHandler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    /// Handles one Stripe event classified by `event_type`.
    pub async fn handle(
        &self,
        event: StripeEvent,
        event_type: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let occurred_at = event.occurred_at()?;
        let kind = event.kind(event_type)?;
        let raw = event.data.object;

        match kind {
            StripeEventKind::PaymentIntentSucceeded(intent)
            | StripeEventKind::PaymentIntentFailed(intent) => {
                self.reconciler
                    .record_payment(intent.into_fact(occurred_at, raw)?)
                    .await
            }
            StripeEventKind::ChargeRefunded(charge) => {
                self.reconciler
                    .record_charge_refund(charge.into_fact(occurred_at)?)
                    .await
            }
            StripeEventKind::SubscriptionCreated(sub) => {
                self.reconciler
                    .record_subscription(
                        sub.into_fact(occurred_at, raw)?,
                        SubscriptionChange::Created,
                    )
                    .await
            }
            StripeEventKind::SubscriptionUpdated(sub) => {
                self.reconciler
                    .record_subscription(
                        sub.into_fact(occurred_at, raw)?,
                        SubscriptionChange::Updated,
                    )
                    .await
            }
            StripeEventKind::SubscriptionDeleted(sub) => {
                self.reconciler
                    .record_subscription(
                        sub.into_fact(occurred_at, raw)?,
                        SubscriptionChange::Canceled,
                    )
                    .await
            }
            StripeEventKind::InvoicePaid(invoice)
            | StripeEventKind::InvoicePaymentFailed(invoice) => {
                self.reconciler
                    .record_provider_invoice(invoice.into_fact(occurred_at)?)
                    .await
            }
            StripeEventKind::Unrecognized(event_type) => {
                debug!(%event_type, event_id = %event.id, "Unrecognized Stripe event acknowledged");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }
}
