//! PayPalEventHandler - dispatches typed PayPal events to the reconciler.

use std::sync::Arc;

use tracing::debug;

use crate::application::handlers::billing::Reconciler;
use crate::domain::billing::{PaymentStatus, SubscriptionChange};
use crate::domain::webhook::{PayPalEvent, PayPalEventKind, ReconcileError, ReconcileOutcome};

pub struct PayPalEventHandler {
    reconciler: Arc<Reconciler>,
}

impl PayPalEventHandler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    /// Handles one PayPal event classified by `event_type`.
    ///
    /// Denied and pending captures take their status from the event type;
    /// the resource status can lag behind it.
    pub async fn handle(
        &self,
        event: PayPalEvent,
        event_type: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let occurred_at = event.occurred_at()?;
        let kind = event.kind(event_type)?;
        let raw = event.resource;

        match kind {
            PayPalEventKind::CaptureCompleted(capture) => {
                self.reconciler
                    .record_payment(capture.into_fact(None, occurred_at, raw)?)
                    .await
            }
            PayPalEventKind::CaptureDenied(capture) => {
                self.reconciler
                    .record_payment(capture.into_fact(
                        Some(PaymentStatus::Failed),
                        occurred_at,
                        raw,
                    )?)
                    .await
            }
            PayPalEventKind::CapturePending(capture) => {
                self.reconciler
                    .record_payment(capture.into_fact(
                        Some(PaymentStatus::Pending),
                        occurred_at,
                        raw,
                    )?)
                    .await
            }
            PayPalEventKind::SaleCompleted(sale) => {
                self.reconciler
                    .record_payment(sale.into_fact(occurred_at, raw)?)
                    .await
            }
            PayPalEventKind::CaptureRefunded(refund) => {
                self.reconciler
                    .record_charge_refund(refund.into_fact(occurred_at)?)
                    .await
            }
            PayPalEventKind::SaleRefunded(refund) => {
                self.reconciler
                    .record_charge_refund(refund.into_fact(occurred_at)?)
                    .await
            }
            PayPalEventKind::SubscriptionCreated(sub) => {
                self.reconciler
                    .record_subscription(
                        sub.into_fact(occurred_at, raw)?,
                        SubscriptionChange::Created,
                    )
                    .await
            }
            PayPalEventKind::SubscriptionUpdated(sub) => {
                self.reconciler
                    .record_subscription(
                        sub.into_fact(occurred_at, raw)?,
                        SubscriptionChange::Updated,
                    )
                    .await
            }
            PayPalEventKind::SubscriptionCancelled(sub) => {
                self.reconciler
                    .record_subscription(
                        sub.into_fact(occurred_at, raw)?,
                        SubscriptionChange::Canceled,
                    )
                    .await
            }
            PayPalEventKind::Unrecognized(event_type) => {
                debug!(%event_type, event_id = %event.id, "Unrecognized PayPal event acknowledged");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }
}
